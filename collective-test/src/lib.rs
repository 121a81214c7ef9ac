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
//! Test support for `collective-rpc`.
//!
//! Import the prelude and annotate async tests with `#[collective_test]`:
//!
//! ```rust,ignore
//! use collective_test::prelude::*;
//!
//! #[collective_test]
//! async fn replies_arrive() -> anyhow::Result<()> {
//!     Ok(())
//! }
//! ```

/// Items a test module normally needs.
pub mod prelude {
    pub use collective_test_macro::collective_test;
}

mod panic_capture;

#[doc(hidden)]
pub mod __private {
    pub use crate::panic_capture::PanicCapture;
    pub use tokio;
    pub use tracing;
}
