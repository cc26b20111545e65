//! Counter demo
//!
//! Two views share one store: a display that selects `count` and a title bar
//! that selects `title`. Updating one field only re-renders the view that
//! selects it.
//!
//! Run with:
//! ```bash
//! RUST_LOG=fastctx=debug cargo run -p fastctx --example counter
//! ```

use fastctx::{create_store_with, store_state, Element, Runtime, Setter, StoreConfig};
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

store_state! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct AppState => AppStatePatch {
        pub count: i64,
        pub title: String,
    }
}

fn main() -> fastctx::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = create_store_with(
        AppState {
            count: 0,
            title: "Counter".into(),
        },
        StoreConfig::new().name("app"),
    );

    let display = {
        let store = store.clone();
        Element::new("Display", move |cx| {
            let (count, _, _) = store.use_store(cx, |s| s.count)?;
            tracing::info!(count, "render Display");
            Ok(Vec::new())
        })
    };

    let setter: Rc<RefCell<Option<Setter<AppState>>>> = Rc::default();
    let title_bar = {
        let store = store.clone();
        let setter = setter.clone();
        Element::new("TitleBar", move |cx| {
            let (title, set, _) = store.use_store(cx, |s| s.title.clone())?;
            tracing::info!(%title, "render TitleBar");
            *setter.borrow_mut() = Some(set);
            Ok(Vec::new())
        })
    };

    let mut runtime = Runtime::new();
    runtime.mount(store.provider(vec![title_bar, display]))?;

    let Some(set) = setter.borrow().clone() else {
        return Ok(());
    };

    for _ in 0..3 {
        set.set_with(|s| AppStatePatch::default().count(s.count + 1));
        let renders = runtime.flush()?;
        tracing::info!(renders, "increment flushed");
    }

    set.set(AppStatePatch::default().title("Clicks"));
    let renders = runtime.flush()?;
    tracing::info!(renders, "rename flushed");

    runtime.unmount();
    Ok(())
}
