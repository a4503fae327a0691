//! Next.js app-router semantics: segment kinds, route paths and module directives.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::languages::Lang;
use crate::types::{FrameworkMeta, SegmentKind};

static RUNTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"runtime\s*=\s*['"](edge|nodejs)['"]"#).expect("valid regex"));

/// HTTP verbs exported by app-router `route` files.
pub const ROUTE_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Classify a file by its stem according to app-router conventions.
#[must_use]
pub fn segment_kind(filepath: &str) -> SegmentKind {
    let stem = Path::new(filepath)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match stem {
        "page" => SegmentKind::Page,
        "layout" => SegmentKind::Layout,
        "route" => SegmentKind::Route,
        "loading" => SegmentKind::Loading,
        "error" | "global-error" => SegmentKind::Error,
        "not-found" => SegmentKind::NotFound,
        "template" => SegmentKind::Template,
        "default" => SegmentKind::Default,
        "middleware" => SegmentKind::Middleware,
        _ => SegmentKind::Other,
    }
}

/// Route path served by a file under `app/`, e.g. `app/(shop)/blog/[slug]/page.tsx`
/// maps to `/blog/:slug`. Root middleware maps to `/`; anything else outside `app/`
/// has no route.
#[must_use]
pub fn derive_route(filepath: &str) -> Option<String> {
    let parts: Vec<&str> = filepath.split('/').collect();
    let Some(app_idx) = parts.iter().position(|p| *p == "app") else {
        return (segment_kind(filepath) == SegmentKind::Middleware).then(|| "/".to_owned());
    };

    let dirs = &parts[app_idx + 1..parts.len().saturating_sub(1).max(app_idx + 1)];
    let mut clean = Vec::with_capacity(dirs.len());
    for part in dirs {
        if part.starts_with('(') && part.ends_with(')') {
            continue;
        }
        if part.starts_with('@') {
            continue;
        }
        if let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
            let inner = inner
                .strip_prefix('[')
                .and_then(|p| p.strip_suffix(']'))
                .unwrap_or(inner);
            match inner.strip_prefix("...") {
                Some(rest) => clean.push(format!("*{rest}")),
                None => clean.push(format!(":{inner}")),
            }
        } else {
            clean.push((*part).to_owned());
        }
    }
    Some(format!("/{}", clean.join("/")))
}

/// Detect `"use client"`, `"use server"` and `export const runtime` in the first 20 lines.
#[must_use]
pub fn detect_directives(source: &str) -> (bool, bool, Option<String>) {
    let mut is_client = false;
    let mut is_server = false;
    let mut runtime = None;
    for line in source.lines().take(20).map(str::trim).filter(|l| !l.is_empty()) {
        let quoted = line.starts_with('"') || line.starts_with('\'');
        if quoted && line.contains("use client") {
            is_client = true;
        }
        if quoted && line.contains("use server") {
            is_server = true;
        }
        if line.contains("export const runtime")
            && let Some(caps) = RUNTIME_RE.captures(line)
        {
            runtime = Some(caps[1].to_owned());
        }
    }
    (is_client, is_server, runtime)
}

/// Framework metadata for a JS/TS file, if it participates in app routing.
#[must_use]
pub fn analyze(filepath: &str, source: &str, lang: Lang) -> Option<FrameworkMeta> {
    if !lang.is_js_family() {
        return None;
    }
    let route_path = derive_route(filepath)?;
    let (is_client, is_server, runtime) = detect_directives(source);
    Some(FrameworkMeta {
        framework: "nextjs".to_owned(),
        route_path: Some(route_path),
        segment: segment_kind(filepath),
        is_client,
        is_server,
        runtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_groups_and_slots_are_dropped() {
        assert_eq!(
            derive_route("app/(marketing)/@modal/blog/[slug]/page.tsx").as_deref(),
            Some("/blog/:slug")
        );
    }

    #[test]
    fn catch_all_segments() {
        assert_eq!(
            derive_route("app/api/auth/[...nextauth]/route.ts").as_deref(),
            Some("/api/auth/*nextauth")
        );
        assert_eq!(
            derive_route("src/app/docs/[[...path]]/page.tsx").as_deref(),
            Some("/docs/*path")
        );
    }

    #[test]
    fn root_page_and_middleware() {
        assert_eq!(derive_route("app/page.tsx").as_deref(), Some("/"));
        assert_eq!(derive_route("middleware.ts").as_deref(), Some("/"));
        assert_eq!(derive_route("lib/util.ts"), None);
    }

    #[test]
    fn segment_kinds_from_file_stem() {
        assert_eq!(segment_kind("app/x/route.ts"), SegmentKind::Route);
        assert_eq!(segment_kind("app/global-error.tsx"), SegmentKind::Error);
        assert_eq!(segment_kind("app/not-found.tsx"), SegmentKind::NotFound);
        assert_eq!(segment_kind("app/robots.ts"), SegmentKind::Other);
    }

    #[test]
    fn directives_in_header() {
        let src = "'use client'\nimport x from 'y'\nexport const runtime = 'edge'\n";
        let (client, server, runtime) = detect_directives(src);
        assert!(client);
        assert!(!server);
        assert_eq!(runtime.as_deref(), Some("edge"));
    }

    #[test]
    fn directives_past_line_twenty_are_ignored() {
        let mut src = String::new();
        for i in 0..25 {
            src.push_str(&format!("const a{i} = {i};\n"));
        }
        src.push_str("\"use server\"\n");
        assert_eq!(detect_directives(&src), (false, false, None));
    }

    #[test]
    fn analyze_skips_non_js() {
        assert!(analyze("app/page.py", "", Lang::Python).is_none());
        let meta = analyze("app/blog/page.tsx", "\"use client\"", Lang::Tsx).unwrap();
        assert_eq!(meta.segment, SegmentKind::Page);
        assert!(meta.is_client);
        assert_eq!(meta.route_path.as_deref(), Some("/blog"));
    }
}
