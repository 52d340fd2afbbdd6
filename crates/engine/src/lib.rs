//! Leave request lifecycle engine: policy evaluation with a local
//! fail-closed fallback, a guarded balance ledger, and transactional
//! submit/decide flows on top of `timeoff-db`.

pub mod context;
pub mod lifecycle;
pub mod remote;

pub use lifecycle::{LifecycleManager, PolicySettings};
pub use remote::HttpPolicyEvaluator;
