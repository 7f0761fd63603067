//! Periodic power state refresh.
//!
//! Any power get/set/push that goes through the proxy restarts the interval,
//! so the timer only queries the device after `interval` of silence.

use flume::RecvTimeoutError;
use log::{debug, info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::proxy::DeviceProxy;

pub struct PullTimer {
    stopped: Arc<AtomicBool>,
    interval: Duration,
}

impl PullTimer {
    pub fn start(proxy: Arc<DeviceProxy>, interval: Duration) -> io::Result<Self> {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        thread::Builder::new()
            .name("pull-timer".to_string())
            .spawn(move || run(&proxy, interval, &flag))?;
        Ok(Self { stopped, interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The thread exits at its next wakeup.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

impl Drop for PullTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(proxy: &DeviceProxy, interval: Duration, stopped: &AtomicBool) {
    let name = proxy.config().name.clone();
    let activity = proxy.power_activity();
    while !stopped.load(Ordering::Relaxed) {
        match activity.recv_timeout(interval) {
            Ok(()) => continue,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if stopped.load(Ordering::Relaxed) {
            break;
        }

        let before = proxy.snapshot().on;
        match proxy.poll_power() {
            Ok(on) if on != before => {
                info!("[{name}] power changed to {}", if on { "ON" } else { "OFF" })
            }
            Ok(_) => debug!("[{name}] pulled power state, unchanged"),
            Err(err) => warn!("[{name}] pulling power state failed: {err}"),
        }
    }
    debug!("[{name}] pull timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristic::{Property, Value};
    use crate::proxy::tests::{lamp_device, proxy_for};

    #[test]
    fn polls_power_after_interval() {
        let device = lamp_device();
        let proxy = Arc::new(proxy_for(&device, ""));
        let timer = PullTimer::start(proxy.clone(), Duration::from_millis(40)).unwrap();
        thread::sleep(Duration::from_millis(300));
        timer.stop();

        assert!(device.count("/status") >= 2);
        assert!(proxy.snapshot().on);
    }

    #[test]
    fn power_activity_resets_interval() {
        let device = lamp_device();
        let proxy = Arc::new(proxy_for(&device, ""));
        let _timer = PullTimer::start(proxy.clone(), Duration::from_millis(400)).unwrap();
        for _ in 0..12 {
            proxy.push(Property::Power, Value::Bool(true)).unwrap();
            thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(device.count("/status"), 0);
    }
}
