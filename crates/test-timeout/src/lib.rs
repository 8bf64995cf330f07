use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, Ident, ItemFn, LitInt, Token};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

enum TimeoutArg {
    Seconds(u64),
    Paused,
}

impl Parse for TimeoutArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let lookahead = input.lookahead1();
        if lookahead.peek(LitInt) {
            let lit: LitInt = input.parse()?;
            let secs: u64 = lit.base10_parse()?;
            if secs == 0 {
                return Err(syn::Error::new_spanned(lit, "timeout must be greater than zero"));
            }
            Ok(TimeoutArg::Seconds(secs))
        } else if lookahead.peek(Ident) {
            let ident: Ident = input.parse()?;
            if ident == "paused" {
                Ok(TimeoutArg::Paused)
            } else {
                Err(syn::Error::new_spanned(ident, "expected `paused` or a timeout in seconds"))
            }
        } else {
            Err(lookahead.error())
        }
    }
}

struct TimeoutArgs {
    secs: u64,
    paused: bool,
}

impl Parse for TimeoutArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = TimeoutArgs {
            secs: DEFAULT_TIMEOUT_SECS,
            paused: false,
        };
        let parsed = Punctuated::<TimeoutArg, Token![,]>::parse_terminated(input)?;
        for arg in parsed {
            match arg {
                TimeoutArg::Seconds(secs) => args.secs = secs,
                TimeoutArg::Paused => args.paused = true,
            }
        }
        Ok(args)
    }
}

/// Runs an async test on a current-thread runtime with a hard wall-clock timeout.
///
/// `#[tokio_timeout_test(paused)]` starts the runtime with tokio's clock paused so
/// debounce windows and intervals elapse instantly once every task is idle. The
/// consuming crate needs tokio's `test-util` feature for that mode.
#[proc_macro_attribute]
pub fn tokio_timeout_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let TimeoutArgs { secs, paused } = parse_macro_input!(attr as TimeoutArgs);

    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            &sig.ident,
            "tokio_timeout_test can only be applied to async functions",
        )
        .to_compile_error()
        .into();
    }

    sig.asyncness = None;

    let filtered_attrs: Vec<Attribute> = attrs
        .into_iter()
        .filter(|attr| !is_test_harness_attribute(attr))
        .collect();

    let builder = if paused {
        quote! {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
        }
    } else {
        quote! {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
        }
    };

    TokenStream::from(quote! {
        #[test]
        #(#filtered_attrs)*
        #vis #sig {
            let timeout_duration = std::time::Duration::from_secs(#secs);
            let (sender, receiver) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let runtime = #builder.expect("failed to build Tokio runtime");
                    runtime.block_on(async {
                        tokio::time::timeout(timeout_duration, async move #block)
                            .await
                            .expect("test timed out");
                    });
                }));
                let _ = sender.send(result);
            });
            match receiver.recv_timeout(timeout_duration + std::time::Duration::from_secs(1)) {
                Ok(Ok(_)) => {}
                Ok(Err(payload)) => std::panic::resume_unwind(payload),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => panic!("test timed out"),
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    panic!("test thread failed before reporting result")
                }
            }
        }
    })
}

fn is_test_harness_attribute(attr: &Attribute) -> bool {
    let segments: Vec<_> = attr.path().segments.iter().collect();
    match segments.as_slice() {
        [single] => single.ident == "test",
        [first, second] => first.ident == "tokio" && second.ident == "test",
        _ => false,
    }
}
