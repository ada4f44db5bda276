pub mod result;
pub mod status;
pub mod tree;

pub use result::{RunSummary, TestResult, TestType};
pub use status::TestStatus;
pub use tree::{NodeKind, SuiteCounts, TestNode, TestTree};
