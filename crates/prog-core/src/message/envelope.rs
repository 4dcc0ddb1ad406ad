//! `Message` — the envelope carried by the bus.
use super::id::MessageId;
use super::point::{Point3D, Point4D};
use super::udata::UData;
use crate::error::ProgError;
use crate::time::TimestampUs;
use std::sync::Arc;

/// A `ProgEvent` describes one predicted failure event: a time series of
/// event-state/system-state pairs (element 0 is "now"), a time-of-event
/// estimate, and the per-savepoint trajectory capture.
///
/// Grounded on `original_source/inc/ProgEvent.h`: "Element 0 corresponds
/// to current time" for `event_state`, `system_state`, and `points`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgEvent {
    pub id: MessageId,
    pub event_state: Vec<UData>,
    pub system_state: Vec<Vec<UData>>,
    pub toe: UData,
    pub points: Vec<Point4D>,
    pub tag: String,
}

impl ProgEvent {
    pub fn new(
        id: MessageId,
        event_state: Vec<UData>,
        system_state: Vec<Vec<UData>>,
        toe: UData,
    ) -> Self {
        ProgEvent {
            id,
            event_state,
            system_state,
            toe,
            points: Vec::new(),
            tag: String::new(),
        }
    }

    pub fn with_points(mut self, points: Vec<Point4D>) -> Self {
        self.points = points;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

/// A full prediction run: every event the predictor is tracking, plus the
/// system trajectory captured along the way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prediction {
    pub events: Vec<ProgEvent>,
    pub system_trajectories: Vec<Point4D>,
}

/// A tagged payload union mirroring the shape encoded in a [`MessageId`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Scalar(f64),
    Vector(Vec<f64>),
    UData(UData),
    UDataVector(Vec<UData>),
    Waypoint(Point3D),
    ProgEvent(Arc<ProgEvent>),
    Prediction(Arc<Prediction>),
}

/// An immutable message envelope: id, source, timestamp, and payload.
///
/// Shared by reference among subscribers — cloning a `Message` is cheap
/// (an `Arc` bump for the payload variants that carry one; the smaller
/// scalar/vector variants are plain value copies).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    source: Arc<str>,
    timestamp: TimestampUs,
    payload: Payload,
}

impl Message {
    /// Constructs a message, validating that `payload`'s shape matches
    /// what `id` declares (the scalar/vector-bit invariant from
    /// `spec.md` §3, checked here instead of at first use).
    pub fn new(
        id: MessageId,
        source: impl Into<Arc<str>>,
        timestamp: TimestampUs,
        payload: Payload,
    ) -> Result<Self, ProgError> {
        let shape_ok = match &payload {
            Payload::None => id.is_none(),
            Payload::Scalar(_) | Payload::UData(_) => id.is_scalar(),
            Payload::Vector(_) | Payload::UDataVector(_) => id.is_vector(),
            Payload::Waypoint(_) | Payload::ProgEvent(_) | Payload::Prediction(_) => true,
        };
        if !shape_ok {
            return Err(ProgError::size_mismatch(format!(
                "message id {id} does not declare a payload shape matching {payload:?}"
            )));
        }
        Ok(Message {
            id,
            source: source.into(),
            timestamp,
            payload,
        })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> TimestampUs {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn scalar(&self) -> Result<f64, ProgError> {
        match &self.payload {
            Payload::Scalar(v) => Ok(*v),
            _ => Err(ProgError::size_mismatch("message payload is not scalar")),
        }
    }

    pub fn vector(&self) -> Result<&[f64], ProgError> {
        match &self.payload {
            Payload::Vector(v) => Ok(v),
            _ => Err(ProgError::size_mismatch("message payload is not a vector")),
        }
    }

    pub fn udata_vector(&self) -> Result<&[UData], ProgError> {
        match &self.payload {
            Payload::UDataVector(v) => Ok(v),
            _ => Err(ProgError::size_mismatch(
                "message payload is not a UData vector",
            )),
        }
    }

    pub fn waypoint(&self) -> Result<Point3D, ProgError> {
        match &self.payload {
            Payload::Waypoint(p) => Ok(*p),
            _ => Err(ProgError::size_mismatch("message payload is not a waypoint")),
        }
    }
}
