//! The message data model: ids, the envelope, uncertainty values, and the
//! position types waypoints and trajectory capture use.
mod envelope;
mod id;
mod point;
mod udata;

pub use envelope::{Payload, Prediction, ProgEvent};
pub use id::{by_name, MessageId};
pub use point::{Point3D, Point4D};
pub use udata::UData;

pub use envelope::Message;
