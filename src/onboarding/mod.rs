//! Onboarding completion: the shared evaluator, the redirect policy, and the two
//! adapters that apply it (server-rendered entry and the client-mounted guard).

pub mod evaluator;
pub mod policy;
pub mod membership;
pub mod guard;
pub mod entry;

pub use evaluator::{completion, evaluate, CompletionState, Evaluation, Requirement};
pub use policy::{path_of, RedirectPolicy};
pub use membership::{MembershipSource, ScopedMembership, WorkspaceDirectory, WorkspaceSummary};
pub use guard::{ClientGuard, Guard, GuardOutcome, GuardState, MembershipInput, MountScope, Navigator};
pub use entry::{EntryDecision, ServerEntry};
