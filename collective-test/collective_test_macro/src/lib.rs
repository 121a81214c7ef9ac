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
use proc_macro::TokenStream;

use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Runs an `async fn` test on a fresh multi-threaded Tokio runtime.
///
/// The test body executes inside a `collective_test` tracing span. Panics raised
/// on this test's runtime workers (including spawned transport tasks) are
/// captured and re-raised on the test thread with their source location, so a
/// failing assertion inside a listener callback still fails the test. Panics in
/// other tests running concurrently are never attributed to this one.
#[proc_macro_attribute]
pub fn collective_test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let vis = &input.vis;
    let attrs = &input.attrs;
    let sig = &input.sig;
    let body = &input.block;
    let name = &sig.ident;
    let inputs = &sig.inputs;
    let output = &sig.output;

    let inner = syn::Ident::new(&format!("__{name}_inner"), name.span());

    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis fn #name() {
            let capture = ::collective_test::__private::PanicCapture::begin();

            let runtime = ::collective_test::__private::tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name(capture.thread_name())
                .enable_all()
                .build()
                .expect("failed to build test runtime");

            let result = runtime.block_on(async {
                let span = ::collective_test::__private::tracing::info_span!(
                    "collective_test",
                    name = stringify!(#name)
                );
                let _enter = span.enter();
                #inner().await
            });
            drop(runtime);

            if let Some(panic_message) = capture.take() {
                panic!("{}", panic_message);
            }

            result.unwrap()
        }

        async fn #inner(#inputs) #output #body
    };

    expanded.into()
}
