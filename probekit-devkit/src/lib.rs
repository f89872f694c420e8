/*!
# probekit DevKit - test support for checks

Makes check tests read like snapshot assertions:
- Aggregator stub with metric / service check assertions and coverage tracking
- Fixture loading from `tests/fixtures`
- Mock vendor API server serving fixtures
*/

pub mod aggregator_stub;
pub mod fixtures;
pub mod mock_api;

pub use aggregator_stub::AggregatorStub;
pub use fixtures::FixtureLoader;
pub use mock_api::MockApi;
