//! A reference prognostics runtime: message bus, trajectory service,
//! system/prognostics models, an unscented Kalman filter observer, a
//! Monte-Carlo predictor, and the asynchronous wrappers and builder that
//! wire them into a running prognoser.
//!
//! # 设计背景（Why）
//! - 各子系统（总线、轨迹、观测器、预测器）只通过消息总线互相可见，允许每个子系统
//!   独立被替换、独立被测试、独立地以不同的调度策略运行。
//! - 单一错误类型 [`error::ProgError`] 贯穿所有模块，下游代码按“种类”而非“来源”分流
//!   失败。
//!
//! # 模块总览（How）
//! - [`message`]：消息信封、64 位路由/形状标识符、不确定性值、位置类型。
//! - [`bus`]：发布/订阅调度核心（确定性的 deferred 模式与线程池 async 模式）。
//! - [`watcher`]：把 N 个标量 id 聚合成一个向量消息。
//! - [`config`]：`key : v1, v2` 文本格式的配置映射与导入/覆盖规则。
//! - [`trajectory`]：航点轨迹服务，及其消息驱动适配器。
//! - [`model`]：`SystemModel`/`PrognosticsModel` 特征。
//! - [`observer`]：状态估计器特征及其 UKF 参考实现。
//! - [`predictor`]：预测器特征及其蒙特卡洛参考实现。
//! - [`async_observer`] / [`async_predictor`]：带超时互斥锁背压的消息驱动包装器。
//! - [`prognoser`]：把以上全部装配成一个可运行系统的构建器。
//! - [`load`]：负载估计器（常量/高斯/滑动平均/剖面）。
//! - [`battery`]：一个代表性的电池退化 `PrognosticsModel`。
//! - [`wire`]：§6 线路格式的编码/解码。
//! - [`observability`]：围绕 `tracing` 的薄封装。
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod async_observer;
pub mod async_predictor;
pub mod battery;
pub mod bus;
pub mod config;
pub mod error;
pub mod load;
pub mod message;
pub mod model;
pub mod observability;
pub mod observer;
pub mod predictor;
pub mod prognoser;
pub mod time;
pub mod trajectory;
pub mod watcher;
pub mod wire;

pub use async_observer::AsyncObserver;
pub use async_predictor::AsyncPredictor;
pub use battery::BatteryModel;
pub use bus::{BusMode, Handler, MessageBus, WorkerPool};
pub use config::ConfigMap;
pub use error::{ErrorKind, ProgError, Result};
pub use load::LoadEstimator;
pub use message::{by_name, Message, MessageId, Payload, Point3D, Point4D, Prediction, ProgEvent, UData};
pub use model::{PrognosticsModel, SystemModel};
pub use observability::install_default_subscriber;
pub use observer::{Observer, Ukf};
pub use predictor::{MonteCarlo, Predictor};
pub use prognoser::{AsyncPrognoser, AsyncPrognoserBuilder};
pub use time::TimestampUs;
pub use trajectory::{TrajectoryAdapter, TrajectoryService};
pub use watcher::MessageWatcher;
