//! Submission publishing: JSON lines on stdout, or one MQTT message per run

use crate::config::{MqttConfig, Output};
use anyhow::{Context, Result};
use probekit_base::Submission;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS};
use std::time::Duration;
use tracing::{debug, info};

const ACK_TIMEOUT: Duration = Duration::from_secs(10);

pub enum Publisher {
    Stdout,
    Mqtt(MqttPublisher),
}

impl Publisher {
    pub fn new(output: Output, mqtt: &MqttConfig) -> Self {
        match output {
            Output::Stdout => Publisher::Stdout,
            Output::Mqtt => Publisher::Mqtt(MqttPublisher::new(mqtt)),
        }
    }

    pub async fn publish(&mut self, submission: &Submission) -> Result<()> {
        let payload =
            serde_json::to_string(submission).context("Failed to serialize submission")?;
        match self {
            Publisher::Stdout => {
                println!("{}", payload);
                Ok(())
            }
            Publisher::Mqtt(mqtt) => mqtt.publish(&submission.check, payload).await,
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            Publisher::Stdout => Ok(()),
            Publisher::Mqtt(mqtt) => mqtt.disconnect().await,
        }
    }
}

pub struct MqttPublisher {
    config: MqttConfig,
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttPublisher {
    pub fn new(config: &MqttConfig) -> Self {
        let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        mqtt_options.set_clean_session(true);
        mqtt_options.set_max_packet_size(config.max_packet_size, config.max_packet_size);

        let (client, eventloop) = AsyncClient::new(mqtt_options, 10);
        Self {
            config: config.clone(),
            client,
            eventloop,
        }
    }

    /// Publish and drive the event loop until the broker acknowledges
    async fn publish(&mut self, check: &str, payload: String) -> Result<()> {
        let topic = self.config.topic(check);
        self.client
            .publish(&topic, QoS::AtLeastOnce, false, payload)
            .await
            .context("Failed to queue submission")?;

        let eventloop = &mut self.eventloop;
        tokio::time::timeout(ACK_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::PubAck(_))) => return Ok(()),
                    Ok(event) => debug!("MQTT event: {:?}", event),
                    Err(e) => return Err(e),
                }
            }
        })
        .await
        .with_context(|| format!("No acknowledgement from {}:{}", self.config.host, self.config.port))?
        .with_context(|| format!("MQTT connection to {}:{} failed", self.config.host, self.config.port))?;

        info!("Published submission on {}", topic);
        Ok(())
    }

    async fn disconnect(mut self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .context("Failed to queue MQTT disconnect")?;

        tokio::time::timeout(ACK_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await
        .context("Timed out closing the MQTT connection")?;
        Ok(())
    }
}
