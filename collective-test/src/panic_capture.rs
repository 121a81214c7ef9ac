/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
use std::collections::BTreeMap;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::thread;

use parking_lot::Mutex;

const THREAD_PREFIX: &str = "collective-test#";

static INSTALL_HOOK: Once = Once::new();
static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);
static SCOPES: Mutex<BTreeMap<String, Slot>> = parking_lot::const_mutex(BTreeMap::new());

type Slot = Arc<Mutex<Option<String>>>;

/// Records panics raised on the threads of one test.
///
/// A single process-wide hook routes each panic to the capture owning the
/// panicking thread, a runtime worker named with
/// [`thread_name`](Self::thread_name). Panics on the test thread itself are
/// not recorded: they unwind into the harness unless the test catches them.
/// Dropping the capture unregisters it.
#[derive(Debug)]
pub struct PanicCapture {
    scope: String,
    slot: Slot,
}

impl PanicCapture {
    /// Starts capturing for one test.
    #[must_use]
    pub fn begin() -> Self {
        INSTALL_HOOK.call_once(install_hook);
        let scope = format!("{THREAD_PREFIX}{}", NEXT_SCOPE.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(Mutex::new(None));
        SCOPES.lock().insert(scope.clone(), Arc::clone(&slot));
        Self { scope, slot }
    }

    /// Name runtime worker threads must carry for their panics to be captured.
    #[must_use]
    pub fn thread_name(&self) -> &str {
        &self.scope
    }

    /// The first panic recorded on a worker thread, if any.
    #[must_use]
    pub fn take(&self) -> Option<String> {
        self.slot.lock().take()
    }
}

impl Drop for PanicCapture {
    fn drop(&mut self) {
        SCOPES.lock().remove(&self.scope);
    }
}

fn install_hook() {
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let current = thread::current();
        let worker_scope = current
            .name()
            .filter(|name| name.starts_with(THREAD_PREFIX))
            .map(str::to_string);

        if let Some(slot) = worker_scope.and_then(|scope| SCOPES.lock().get(&scope).cloned()) {
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "no panic message".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string());
            let cleaned = message.trim().replace('\n', " ");
            tracing::error!(%location, "panic: {}", cleaned);
            slot.lock().get_or_insert(format!("panic at {location}: {cleaned}"));
        }
        previous_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panic_on_thread(name: &str, message: &'static str) {
        let result = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || panic!("{}", message))
            .unwrap()
            .join();
        assert!(result.is_err());
    }

    #[test]
    fn test_worker_panic_reaches_only_its_own_capture() {
        let first = PanicCapture::begin();
        let second = PanicCapture::begin();

        panic_on_thread(second.thread_name(), "listener blew up");

        assert!(first.take().is_none());
        assert!(second.take().is_some_and(|m| m.contains("listener blew up")));
    }

    #[test]
    fn test_caught_panic_on_test_thread_is_ignored() {
        let capture = PanicCapture::begin();
        let caught = panic::catch_unwind(|| panic!("handled"));
        assert!(caught.is_err());
        assert!(capture.take().is_none());
    }

    #[test]
    fn test_dropped_capture_stops_recording() {
        let capture = PanicCapture::begin();
        let name = capture.thread_name().to_string();
        drop(capture);

        panic_on_thread(&name, "after the test ended");
        assert!(!SCOPES.lock().contains_key(&name));
    }
}
