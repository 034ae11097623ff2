//! Handler dispatch.
//!
//! # Data Flow
//! ```text
//! handler ref + PathParams + RequestContext
//!     → dispatcher.rs (look up handler, walk its ParamSpec list)
//!     → args.rs (coerce path/input values to declared kinds)
//!     → container.rs (resolve dependency parameters by type identity)
//!     → handler(&Args, &RequestContext) → Reply
//! ```
//!
//! Handlers declare their signature explicitly; nothing is discovered at
//! runtime.

pub mod args;
pub mod container;
pub mod dispatcher;

pub use args::{ArgValue, Args, DependencyKey, ParamKind, ParamSpec};
pub use container::{Container, Provider};
pub use dispatcher::{Dispatcher, Handler, HandlerFn};
