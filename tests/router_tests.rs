//! Tests for the router and the compiled path trie
//!
//! # Test Coverage
//!
//! Validates the router's core responsibilities:
//! - Pattern registration (literal, `:param`, `:param(regex)`, `:rest*`,
//!   `::escaped` segments)
//! - Match precedence: literal children always beat the vary child
//! - Mount-root boundaries and router stacking
//! - Not-found (501), method-not-allowed (405 + Allow), automatic OPTIONS
//!   (204 + Allow)
//! - Trailing-slash near-miss redirect when enabled
//!
//! # Test Strategy
//!
//! Every test drives the public `Router` surface through a bound
//! `RequestContext`, the same way the dispatcher does in production. Fatal
//! registration conflicts are asserted with `catch_unwind`.

mod common;

use common::{init_tracing, ok_handler};
use http::Method;
use std::sync::Arc;
use trellis::{DispatchError, RequestContext, Router, RouterOptions};

fn serve(router: &Router, method: Method, path: &str) -> RequestContext {
    let mut ctx = RequestContext::new();
    ctx.bind(method, path, "localhost", "");
    if let Err(err) = router.serve(&mut ctx) {
        ctx.error(&err);
    }
    ctx
}

#[test]
fn test_literal_route_dispatch() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/health", ok_handler("healthy"));

    let ctx = serve(&router, Method::GET, "/health");
    assert_eq!(ctx.response.status(), 200);
}

#[test]
fn test_param_and_wildcard_binding() {
    init_tracing();
    let mut router = Router::new("/");
    router.get(
        "/users/:id/files/:rest*",
        Arc::new(|ctx: &mut RequestContext| {
            let rendered = format!(
                "{}:{}",
                ctx.param("id").unwrap_or(""),
                ctx.param("rest").unwrap_or("")
            );
            ctx.end(200, Some(rendered.as_bytes()));
            Ok(())
        }),
    );

    let mut ctx = serve(&router, Method::GET, "/users/42/files/a/b/c.txt");
    assert_eq!(ctx.response.status(), 200);
    let committed = ctx.response.take_committed();
    assert_eq!(committed.body, b"42:a/b/c.txt");
}

#[test]
fn test_regex_constrained_segment() {
    init_tracing();
    let mut router = Router::new("/");
    router.get(r"/orders/:id(^\d+$)", ok_handler("order"));

    let ctx = serve(&router, Method::GET, "/orders/1234");
    assert_eq!(ctx.response.status(), 200);

    // Constraint failure is an ordinary not-found, not a 4xx.
    let ctx = serve(&router, Method::GET, "/orders/abc");
    assert_eq!(ctx.response.status(), 501);
}

#[test]
fn test_escaped_colon_is_a_literal() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/::status", ok_handler("status"));

    let ctx = serve(&router, Method::GET, "/:status");
    assert_eq!(ctx.response.status(), 200);

    let ctx = serve(&router, Method::GET, "/status");
    assert_eq!(ctx.response.status(), 501);
}

#[test]
fn test_literal_beats_param_regardless_of_order() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/a/:x", ok_handler("param"));
    router.get("/a/b", ok_handler("literal"));

    let mut ctx = serve(&router, Method::GET, "/a/b");
    assert_eq!(ctx.response.take_committed().body, b"literal");

    let mut ctx = serve(&router, Method::GET, "/a/z");
    assert_eq!(ctx.response.take_committed().body, b"param");
}

#[test]
fn test_method_not_allowed_carries_allow_header() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/thing", ok_handler("get"));
    router.head("/thing", ok_handler("head"));
    router.post("/thing", ok_handler("post"));
    router.put("/thing", ok_handler("put"));

    let ctx = serve(&router, Method::DELETE, "/thing");
    assert_eq!(ctx.response.status(), 405);
    assert_eq!(
        ctx.response.get_header("Allow"),
        Some("GET, HEAD, POST, PUT")
    );
}

#[test]
fn test_auto_options_answers_204_with_allow() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/thing", ok_handler("get"));
    router.post("/thing", ok_handler("post"));

    let ctx = serve(&router, Method::OPTIONS, "/thing");
    assert_eq!(ctx.response.status(), 204);
    assert_eq!(ctx.response.get_header("Allow"), Some("GET, POST"));
}

#[test]
fn test_explicit_options_chain_wins_over_auto() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/thing", ok_handler("get"));
    router.options(
        "/thing",
        Arc::new(|ctx: &mut RequestContext| {
            ctx.response.set_header("Allow", "GET, OPTIONS".to_string());
            ctx.end(200, Some(b"custom options"));
            Ok(())
        }),
    );

    let ctx = serve(&router, Method::OPTIONS, "/thing");
    assert_eq!(ctx.response.status(), 200);
}

#[test]
fn test_auto_options_disabled_yields_405() {
    init_tracing();
    let mut router = Router::with_options(
        "/",
        RouterOptions {
            auto_options: false,
            ..RouterOptions::default()
        },
    );
    router.get("/thing", ok_handler("get"));

    let ctx = serve(&router, Method::OPTIONS, "/thing");
    assert_eq!(ctx.response.status(), 405);
    assert_eq!(ctx.response.get_header("Allow"), Some("GET"));
}

#[test]
fn test_unmatched_path_is_501() {
    init_tracing();
    let router = Router::new("/");
    let ctx = serve(&router, Method::GET, "/nothing/here");
    assert_eq!(ctx.response.status(), 501);
}

#[test]
fn test_mount_root_segment_boundary() {
    init_tracing();
    let mut api = Router::new("/api");
    api.get("/users", ok_handler("api users"));

    // Root path of the mount answers patterns registered at "/".
    let mut root_router = Router::new("/api");
    root_router.get("/", ok_handler("api root"));
    let ctx = serve(&root_router, Method::GET, "/api");
    assert_eq!(ctx.response.status(), 200);

    let ctx = serve(&api, Method::GET, "/api/users");
    assert_eq!(ctx.response.status(), 200);

    // "/apix" shares a prefix but not a segment; the router declines.
    let ctx = serve(&api, Method::GET, "/apix/users");
    assert!(!ctx.is_ended());
    assert_eq!(ctx.response.status(), 0);
}

#[test]
fn test_stacked_routers_first_match_wins() {
    init_tracing();
    let mut admin = Router::new("/admin");
    admin.get("/panel", ok_handler("admin"));
    let mut public = Router::new("/");
    public.get("/home", ok_handler("public"));

    let mut ctx = RequestContext::new();
    ctx.bind(Method::GET, "/admin/panel", "", "");
    admin.serve(&mut ctx).expect("admin serves");
    assert_eq!(ctx.response.status(), 200);

    // The admin router declines /home; the public router picks it up.
    let mut ctx = RequestContext::new();
    ctx.bind(Method::GET, "/home", "", "");
    admin.serve(&mut ctx).expect("admin declines");
    assert!(!ctx.is_ended());
    public.serve(&mut ctx).expect("public serves");
    assert_eq!(ctx.response.status(), 200);
}

#[test]
fn test_trailing_slash_redirect_both_directions() {
    init_tracing();
    let mut router = Router::with_options(
        "/",
        RouterOptions {
            redirect_trailing_slash: true,
            ..RouterOptions::default()
        },
    );
    router.get("/docs", ok_handler("docs"));
    router.get("/blog/", ok_handler("blog"));

    let ctx = serve(&router, Method::GET, "/docs/");
    assert_eq!(ctx.response.status(), 307);
    assert_eq!(ctx.response.get_header("Location"), Some("/docs"));

    let ctx = serve(&router, Method::GET, "/blog");
    assert_eq!(ctx.response.status(), 307);
    assert_eq!(ctx.response.get_header("Location"), Some("/blog/"));

    // A genuine miss stays a miss.
    let ctx = serve(&router, Method::GET, "/missing/");
    assert_eq!(ctx.response.status(), 501);
}

#[test]
fn test_trailing_slash_redirect_off_by_default() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/docs", ok_handler("docs"));

    let ctx = serve(&router, Method::GET, "/docs/");
    assert_eq!(ctx.response.status(), 501);
}

#[test]
fn test_otherwise_replaces_both_fallbacks() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/thing", ok_handler("get"));
    router.otherwise(Arc::new(|ctx: &mut RequestContext| {
        ctx.end(404, Some(b"custom fallback"));
        Ok(())
    }));

    let ctx = serve(&router, Method::GET, "/missing");
    assert_eq!(ctx.response.status(), 404);

    let ctx = serve(&router, Method::DELETE, "/thing");
    assert_eq!(ctx.response.status(), 404);
}

#[test]
fn test_case_insensitive_router() {
    init_tracing();
    let mut router = Router::with_options(
        "/",
        RouterOptions {
            ignore_case: true,
            ..RouterOptions::default()
        },
    );
    router.get("/Health", ok_handler("ok"));

    let ctx = serve(&router, Method::GET, "/health");
    assert_eq!(ctx.response.status(), 200);
    let ctx = serve(&router, Method::GET, "/HEALTH");
    assert_eq!(ctx.response.status(), 200);
}

#[test]
fn test_chain_stops_once_context_ends() {
    init_tracing();
    let mut router = Router::new("/");
    router.handle(
        Method::GET,
        "/guarded",
        vec![
            Arc::new(|ctx: &mut RequestContext| {
                ctx.end(403, Some(b"denied"));
                Ok(())
            }),
            Arc::new(|ctx: &mut RequestContext| {
                ctx.set("second_ran", true);
                Ok(())
            }),
        ],
    );

    let ctx = serve(&router, Method::GET, "/guarded");
    assert_eq!(ctx.response.status(), 403);
    assert_eq!(ctx.get::<bool>("second_ran"), None);
}

#[test]
fn test_handler_error_surfaces_its_status() {
    init_tracing();
    let mut router = Router::new("/");
    router.get(
        "/teapot",
        Arc::new(|_: &mut RequestContext| Err(DispatchError::http(418, "teapot"))),
    );

    let ctx = serve(&router, Method::GET, "/teapot");
    assert_eq!(ctx.response.status(), 418);
    assert_eq!(
        ctx.response.get_header("Content-Type"),
        Some("application/json")
    );
}

#[test]
fn test_any_answers_every_common_method() {
    init_tracing();
    let mut router = Router::new("/");
    router.any("/echo", ok_handler("echo"));

    for method in [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS] {
        let ctx = serve(&router, method, "/echo");
        assert_eq!(ctx.response.status(), 200);
    }
}

#[test]
fn test_conflicting_registration_panics() {
    init_tracing();
    let mut router = Router::new("/");
    router.get("/users/:id", ok_handler("first"));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut router = Router::new("/");
        router.get("/users/:id", ok_handler("first"));
        router.get("/users/:uid", ok_handler("conflict"));
    }));
    assert!(result.is_err());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut router = Router::new("/");
        router.get("/dup", ok_handler("one"));
        router.get("/dup", ok_handler("two"));
    }));
    assert!(result.is_err());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut router = Router::new("/");
        router.handle(Method::GET, "/empty", vec![]);
    }));
    assert!(result.is_err());
}

#[test]
fn test_non_terminal_router_leaves_context_open() {
    init_tracing();
    let mut router = Router::with_options(
        "/",
        RouterOptions {
            terminal: false,
            ..RouterOptions::default()
        },
    );
    router.get(
        "/partial",
        Arc::new(|ctx: &mut RequestContext| {
            ctx.response.set_status(200);
            ctx.response.write(b"partial");
            Ok(())
        }),
    );

    let mut ctx = RequestContext::new();
    ctx.bind(Method::GET, "/partial", "", "");
    router.serve(&mut ctx).expect("serve");
    assert!(!ctx.is_ended());
}
