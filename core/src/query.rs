//! JSON:API query description and its URL query-string form.
//!
//! Values are emitted verbatim; only the `[type]` / `[key]` suffixes of
//! `fields` and `page` are form-url-encoded. Include paths, attribute names
//! and cursors containing reserved characters are therefore sent as is, which
//! is what the Patreon endpoints have always been called with.

use url::form_urlencoded::byte_serialize;

/// Page selection for cursor-paginated endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub size: Option<u32>,
    pub cursor: Option<String>,
}

impl Page {
    pub fn new(size: u32, cursor: Option<&str>) -> Self {
        Self {
            size: Some(size),
            cursor: cursor.map(str::to_string),
        }
    }

    /// Drop a zero size and an empty cursor, which the API treats as absent.
    pub fn normalized(self) -> Self {
        Self {
            size: self.size.filter(|s| *s != 0),
            cursor: self.cursor.filter(|c| !c.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.cursor.is_none()
    }
}

/// Which related resources to include, which attributes to return per type,
/// and which page to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub include: Vec<String>,
    /// Sparse fieldsets in insertion order.
    pub fields: Vec<(String, Vec<String>)>,
    pub page: Page,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the attribute list for `resource_type`. Setting a type twice
    /// replaces its list and keeps its original position.
    pub fn fields<I, S>(mut self, resource_type: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        match self.fields.iter_mut().find(|(t, _)| t == resource_type) {
            Some((_, existing)) => *existing = attributes,
            None => self.fields.push((resource_type.to_string(), attributes)),
        }
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page.size = Some(size);
        self
    }

    pub fn page_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.page.cursor = Some(cursor.into());
        self
    }

    pub fn to_query_string(&self) -> String {
        build_query_string(self)
    }
}

fn bracketed(name: &str, key: &str) -> String {
    let encoded: String = byte_serialize(format!("[{key}]").as_bytes()).collect();
    format!("{name}{encoded}")
}

/// Render `query` as `?include=...&fields%5Btype%5D=...&page%5Bsize%5D=...`,
/// or an empty string when nothing is selected.
pub fn build_query_string(query: &Query) -> String {
    let mut segments = Vec::new();

    if !query.include.is_empty() {
        segments.push(format!("include={}", query.include.join(",")));
    }

    for (resource_type, attributes) in &query.fields {
        if attributes.is_empty() {
            continue;
        }
        segments.push(format!(
            "{}={}",
            bracketed("fields", resource_type),
            attributes.join(",")
        ));
    }

    if let Some(size) = query.page.size.filter(|s| *s != 0) {
        segments.push(format!("{}={size}", bracketed("page", "size")));
    }
    if let Some(cursor) = query.page.cursor.as_deref().filter(|c| !c.is_empty()) {
        segments.push(format!("{}={cursor}", bracketed("page", "cursor")));
    }

    if segments.is_empty() {
        String::new()
    } else {
        format!("?{}", segments.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_empty_string() {
        assert_eq!(build_query_string(&Query::new()), "");
    }

    #[test]
    fn include_is_comma_joined() {
        let q = Query::new().include(["a", "b"]);
        assert_eq!(q.to_query_string(), "?include=a,b");
    }

    #[test]
    fn segments_follow_include_fields_page_order() {
        let q = Query::new()
            .page_cursor("abc")
            .page_size(10)
            .fields("campaign", ["creation_name", "vanity"])
            .include(["tiers"]);
        assert_eq!(
            q.to_query_string(),
            "?include=tiers&fields%5Bcampaign%5D=creation_name,vanity&page%5Bsize%5D=10&page%5Bcursor%5D=abc"
        );
    }

    #[test]
    fn fields_keep_insertion_order_and_skip_empty_lists() {
        let q = Query::new()
            .fields("user", ["email"])
            .fields("tier", Vec::<String>::new())
            .fields("member", ["patron_status"]);
        assert_eq!(
            q.to_query_string(),
            "?fields%5Buser%5D=email&fields%5Bmember%5D=patron_status"
        );
    }

    #[test]
    fn setting_a_type_twice_replaces_in_place() {
        let q = Query::new()
            .fields("user", ["email"])
            .fields("member", ["note"])
            .fields("user", ["vanity"]);
        assert_eq!(q.fields[0], ("user".to_string(), vec!["vanity".to_string()]));
        assert_eq!(q.fields.len(), 2);
    }

    #[test]
    fn zero_size_and_empty_cursor_are_omitted() {
        let q = Query::new().page_size(0).page_cursor("");
        assert_eq!(q.to_query_string(), "");
    }

    #[test]
    fn values_are_not_escaped() {
        let q = Query::new().page_cursor("a b&c");
        assert_eq!(q.to_query_string(), "?page%5Bcursor%5D=a b&c");
    }

    #[test]
    fn page_normalized_drops_empty_parts() {
        let page = Page::new(0, Some("")).normalized();
        assert!(page.is_empty());
        let page = Page::new(25, None).normalized();
        assert_eq!(page.size, Some(25));
    }
}
