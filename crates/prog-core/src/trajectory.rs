//! `TrajectoryService` — an ordered ETA → waypoint map with linear
//! interpolation, plus a message-driven adapter.
//!
//! # 设计背景（Why）
//! - 轨迹服务本身是纯粹的同步状态（一个按 ETA 排序的航点表），不需要了解总线的存在；
//!   只有适配器（`TrajectoryAdapter`）需要把 `RouteStart`/`RouteEnd`/`RouteSetWP`/
//!   `RouteDeleteWP`/`RouteClear` 消息转发给它。
//! - 适配器使用一把普通（非定时）互斥锁，而不是 `AsyncObserver`/`AsyncPredictor`
//!   使用的定时互斥锁：航点是低频控制流量，不是背压敏感的热路径，丢弃一条
//!   `RouteSetWP` 会悄悄地损坏航线，因此宁愿阻塞也不要丢弃（见 `SPEC_FULL.md`
//!   §4.3a）。
use crate::bus::{Handler, MessageBus};
use crate::error::ProgError;
use crate::message::{Message, MessageId, Payload, Point3D};
use crate::time::TimestampUs;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An ordered ETA → waypoint map, with linear interpolation between
/// consecutive waypoints.
#[derive(Debug, Default)]
pub struct TrajectoryService {
    waypoints: BTreeMap<TimestampUs, Point3D>,
}

impl TrajectoryService {
    pub fn new() -> Self {
        TrajectoryService::default()
    }

    pub fn set_waypoint(&mut self, eta: TimestampUs, position: Point3D) {
        self.waypoints.insert(eta, position);
    }

    pub fn delete_waypoint(&mut self, eta: TimestampUs) {
        self.waypoints.remove(&eta);
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
    }

    /// The ETAs of every registered waypoint, in ascending order.
    pub fn get_savepts(&self) -> Vec<TimestampUs> {
        self.waypoints.keys().copied().collect()
    }

    /// Interpolates a position for `t`, linearly between the surrounding
    /// waypoints. `OutOfRange` if `t` falls before the first or after the
    /// last waypoint, or if fewer than two waypoints are registered.
    pub fn get_point(&self, t: TimestampUs) -> Result<Point3D, ProgError> {
        if self.waypoints.len() < 2 {
            return Err(ProgError::out_of_range(
                "trajectory needs at least two waypoints to interpolate",
            ));
        }
        let first = *self.waypoints.keys().next().unwrap();
        let last = *self.waypoints.keys().next_back().unwrap();
        if t < first || t > last {
            return Err(ProgError::out_of_range(format!(
                "t={t} is outside the trajectory's [{first}, {last}] range"
            )));
        }
        if let Some(exact) = self.waypoints.get(&t) {
            return Ok(*exact);
        }

        let lower = self
            .waypoints
            .range(..t)
            .next_back()
            .map(|(eta, pos)| (*eta, *pos))
            .unwrap();
        let upper = self
            .waypoints
            .range(t..)
            .next()
            .map(|(eta, pos)| (*eta, *pos))
            .unwrap();

        let ratio = (t - lower.0) as f64 / (upper.0 - lower.0) as f64;
        Ok(lower.1.lerp(upper.1, ratio))
    }
}

/// Forwards `RouteStart`/`RouteEnd`/`RouteClear`/`RouteSetWP`/
/// `RouteDeleteWP` messages on `source` into an owned [`TrajectoryService`].
pub struct TrajectoryAdapter {
    inner: Arc<Mutex<TrajectoryService>>,
}

impl TrajectoryAdapter {
    /// Builds the adapter and subscribes it to every route message on
    /// `source`.
    pub fn new(bus: &MessageBus, source: impl Into<Arc<str>>) -> Arc<Self> {
        let source = source.into();
        let adapter = Arc::new(TrajectoryAdapter {
            inner: Arc::new(Mutex::new(TrajectoryService::new())),
        });
        for id in [
            MessageId::ROUTE_START,
            MessageId::ROUTE_END,
            MessageId::ROUTE_CLEAR,
            MessageId::ROUTE_SET_WP,
            MessageId::ROUTE_DELETE_WP,
        ] {
            let handler: Arc<dyn Handler> = adapter.clone();
            bus.subscribe(handler, source.clone(), id);
        }
        adapter
    }

    pub fn get_savepts(&self) -> Vec<TimestampUs> {
        self.inner.lock().get_savepts()
    }

    pub fn get_point(&self, t: TimestampUs) -> Result<Point3D, ProgError> {
        self.inner.lock().get_point(t)
    }

    /// A shared handle to the underlying service, for composing a
    /// [`crate::predictor::SavePointProvider`] without re-subscribing.
    pub fn shared(&self) -> Arc<Mutex<TrajectoryService>> {
        self.inner.clone()
    }
}

impl Handler for TrajectoryAdapter {
    fn handle(&self, message: &Message) {
        let mut inner = self.inner.lock();
        match message.id() {
            id if id == MessageId::ROUTE_START => inner.clear(),
            id if id == MessageId::ROUTE_CLEAR => inner.clear(),
            id if id == MessageId::ROUTE_END => {}
            id if id == MessageId::ROUTE_SET_WP => {
                if let Ok(position) = message.waypoint() {
                    inner.set_waypoint(message.timestamp(), position);
                }
            }
            id if id == MessageId::ROUTE_DELETE_WP => {
                if let Ok(eta) = message.scalar() {
                    inner.delete_waypoint(eta as TimestampUs);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_linearly_between_two_waypoints() {
        let mut svc = TrajectoryService::new();
        svc.set_waypoint(0, Point3D::new(0.0, 0.0, 0.0));
        svc.set_waypoint(10, Point3D::new(10.0, 0.0, 0.0));
        let mid = svc.get_point(5).unwrap();
        assert_eq!(mid.lat, 5.0);
    }

    #[test]
    fn extrapolation_is_out_of_range() {
        let mut svc = TrajectoryService::new();
        svc.set_waypoint(0, Point3D::new(0.0, 0.0, 0.0));
        svc.set_waypoint(10, Point3D::new(10.0, 0.0, 0.0));
        assert!(svc.get_point(20).is_err());
    }

    #[test]
    fn scenario_5_set_then_delete_waypoint() {
        let bus = MessageBus::new_deferred();
        let adapter = TrajectoryAdapter::new(&bus, "gps0");

        bus.publish(Message::new(MessageId::ROUTE_START, "gps0", 0, Payload::None).unwrap());
        bus.publish(
            Message::new(
                MessageId::ROUTE_SET_WP,
                "gps0",
                5_000_000,
                Payload::Waypoint(Point3D::new(1.0, 2.0, 3.0)),
            )
            .unwrap(),
        );
        bus.publish(
            Message::new(
                MessageId::ROUTE_SET_WP,
                "gps0",
                7_500_000,
                Payload::Waypoint(Point3D::new(1.0, 2.0, 3.0)),
            )
            .unwrap(),
        );
        bus.publish(Message::new(MessageId::ROUTE_END, "gps0", 7_500_000, Payload::None).unwrap());
        bus.wait_all();

        assert_eq!(adapter.get_savepts(), vec![5_000_000, 7_500_000]);

        bus.publish(
            Message::new(
                MessageId::ROUTE_DELETE_WP,
                "gps0",
                0,
                Payload::Scalar(7_500_000.0),
            )
            .unwrap(),
        );
        bus.wait_all();
        assert_eq!(adapter.get_savepts(), vec![5_000_000]);
    }
}
