//! Wire formats: JSON request/response (spec.md §6.1) and the legacy hydra
//! text format (spec.md §6.3).

pub mod hydra;
pub mod request;
pub mod response;

pub use request::{LocationRequest, PickInput, SiteInput, SourceInput};
pub use response::{ErrorEllipsoidAxis, ErrorEllipsoidOutput, LocationResponse, PickOutput};
