//! 外部协作者接口
//!
//! 引擎只通过这里的窄接口与渲染器和用户消息通道交互：
//! - [`Renderer`]：请求一次动画过渡，返回过渡完成的 future
//! - [`MessageSink`]：面向用户的提示信息
//!
//! 两者放在同一个显式的 [`MotionContext`] 中传递。

use crate::math::Point3;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 渲染器：把积木从当前位置动画移动到目标位置
pub trait Renderer: Send + Sync {
    fn request_animated_move(
        &self,
        block: &str,
        from: Point3,
        to: Point3,
        duration: Duration,
    ) -> BoxFuture<'static, ()>;
}

/// 立即完成的渲染器（无界面运行）
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantRenderer;

impl Renderer for InstantRenderer {
    fn request_animated_move(
        &self,
        block: &str,
        from: Point3,
        to: Point3,
        _duration: Duration,
    ) -> BoxFuture<'static, ()> {
        tracing::debug!(
            "Move {}: ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})",
            block,
            from.x,
            from.y,
            from.z,
            to.x,
            to.y,
            to.z
        );
        futures::future::ready(()).boxed()
    }
}

/// 按过渡时长在 tokio 定时器上等待的渲染器
#[derive(Debug, Default, Clone, Copy)]
pub struct TimedRenderer;

impl Renderer for TimedRenderer {
    fn request_animated_move(
        &self,
        block: &str,
        _from: Point3,
        to: Point3,
        duration: Duration,
    ) -> BoxFuture<'static, ()> {
        tracing::debug!("Animating {} to ({:.3}, {:.3}, {:.3}) over {:?}", block, to.x, to.y, to.z, duration);
        tokio::time::sleep(duration).boxed()
    }
}

/// 用户消息通道
pub trait MessageSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// 以 warn 级别写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn notify(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// 保留所有消息，供调用方检查
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl MessageSink for CollectingSink {
    fn notify(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

/// 运动上下文
#[derive(Clone)]
pub struct MotionContext {
    pub renderer: Arc<dyn Renderer>,
    pub sink: Arc<dyn MessageSink>,
}

impl MotionContext {
    pub fn new(renderer: Arc<dyn Renderer>, sink: Arc<dyn MessageSink>) -> Self {
        Self { renderer, sink }
    }

    /// 立即完成的渲染 + 日志消息
    pub fn headless() -> Self {
        Self::new(Arc::new(InstantRenderer), Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for MotionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionContext").finish_non_exhaustive()
    }
}
