//! `setTimeout`-backed timer

use std::time::Duration;

use futures::future::LocalBoxFuture;
use ogp_core::Timer;

#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTimer;

impl Timer for GlooTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(gloo_timers::future::sleep(duration))
    }
}
