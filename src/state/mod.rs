//! Map view state: the record itself, its wire forms, the object-id codec,
//! the resolver that decides which source is authoritative, and the
//! selection state machine.

pub mod object_id;
pub mod resolver;
pub mod selection;
pub mod url_state;
mod view_state;

pub use object_id::{ObjectIdCodec, ObjectReference};
pub use resolver::{ExternalUpdate, StateResolver, StateSource, UrlMode};
pub use selection::{
    Generation, LoadSignals, Lookup, PendingResolution, Progress, Resolution, SelectionState,
    SelectionTracker,
};
pub use view_state::{
    Camera, MapViewState, ViewChange, ANGLE_PRECISION, COORD_PRECISION, ZOOM_PRECISION,
};
