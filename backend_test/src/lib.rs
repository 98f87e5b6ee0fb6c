use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against an
/// in-process server whose voting service and recognition engine are fakes.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// `crate::backend::fake::FakeBackend` and
/// `crate::identity::ocr::fake::FakeOcr`. The fakes are shared with the
/// server, so a test can script failures and inspect recorded votes.
///
/// With `#[backend_test(identified)]` the client has already passed the
/// identity check as the example voter.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Pass the identity check if needed.
    let maybe_identify = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "identified" => quote! {
            {
                let response = rocket_client
                    .post(uri!(crate::api::identity::verify))
                    .body(b"\x89PNG\r\n\x1a\n id card".as_slice())
                    .dispatch()
                    .await;
                assert_eq!(
                    rocket::http::Status::Ok,
                    response.status(),
                    "identity check failed during test setup"
                );
            }
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `identified` or nothing")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::backend::fake::FakeBackend,
                crate::identity::ocr::fake::FakeOcr,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["evoting_desk"],
                    None,
                    None,
                );

                let backend = crate::backend::fake::FakeBackend::example();
                let ocr = crate::identity::ocr::fake::FakeOcr::example();
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_with_fakes(backend.clone(), ocr.clone()),
                )
                .await
                .unwrap();

                #maybe_identify

                (rocket_client, backend, ocr)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, backend, ocr) = setup().await;
                #new_name(#(#test_args),*).await
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut seen: Vec<&'static str> = vec![];
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(type_ident) = type_path.path.get_ident() {
                    let injected = if type_ident == "Client" {
                        Some(("Client", quote! { rocket_client }))
                    } else if type_ident == "FakeBackend" {
                        Some(("FakeBackend", quote! { backend }))
                    } else if type_ident == "FakeOcr" {
                        Some(("FakeOcr", quote! { ocr }))
                    } else {
                        None
                    };
                    if let Some((kind, arg)) = injected {
                        if seen.contains(&kind) {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one `{kind}`"),
                            ));
                        }
                        seen.push(kind);
                        args.push(arg);
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `backend_ident: FakeBackend` or `ocr_ident: FakeOcr`",
        ));
    }

    Ok(args)
}
