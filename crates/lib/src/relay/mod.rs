//! Relay core: classify inbound messages and route them between end-users and the operator.
//!
//! Users' messages are announced to the operator with a header and forwarded; both relayed ids
//! are recorded in the [`CorrelationStore`](crate::correlation::CorrelationStore). The operator
//! answers by replying to either item, and the reply-target resolves back to the user.

mod event;
mod router;

pub use event::{classify, InboundEvent};
pub use router::{RelayRouter, RouteOutcome};
