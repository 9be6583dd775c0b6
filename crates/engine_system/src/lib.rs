//! # engine_system
//!
//! Systems observe one component kind. On every scheduler tick each system
//! recomputes the set of components of its kind, diffs it against the set it
//! saw on its previous tick, and calls up to three callbacks in a fixed
//! order: `on_update(current)`, then `on_added(added)`, then
//! `on_removed(removed)`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engine_component::ComponentRegistry;
//! use engine_state::StateContext;
//! use engine_system::{System, SystemScheduler};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let registry = ComponentRegistry::new(&StateContext::new());
//! let scheduler = SystemScheduler::new(&registry);
//!
//! scheduler.register(System::new("rendered").on_added(|added| async move {
//!     println!("{} new renderables", added.len());
//!     Ok(())
//! }));
//!
//! scheduler.tick().await?;
//! # Ok(())
//! # }
//! ```

pub mod runner;
pub mod scheduler;
pub mod system;

pub use runner::{MembershipDiff, SystemRunner};
pub use scheduler::SystemScheduler;
pub use system::{MembershipCallback, System, SystemId};
