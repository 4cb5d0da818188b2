use serde::{Deserialize, Serialize};

use crate::validator::{permitted_value, Validator};

pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page, page size and sort requested by a client for a list query.
///
/// `sort_safelist` is fixed per query site; `sort` must equal one of its
/// entries exactly. A leading `-` marks descending order.
#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

pub fn validate_filters(v: &mut Validator, f: &Filters) {
    v.check(f.page > 0, "page", "must be greater than zero");
    v.check(f.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
    v.check(f.page_size > 0, "page_size", "must be greater than zero");
    v.check(f.page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100");

    v.check(
        permitted_value(f.sort.as_str(), f.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

impl Filters {
    /// Column name for the ORDER BY clause.
    ///
    /// The returned string is taken from the safelist, never from the client
    /// value. Panics when `sort` is not in the safelist: `validate_filters`
    /// must have rejected it already, and no query may be built from it.
    pub fn sort_column(&self) -> &'static str {
        match self.sort_safelist.iter().copied().find(|safe| *safe == self.sort) {
            Some(safe) => safe.strip_prefix('-').unwrap_or(safe),
            None => panic!("unsafe sort parameter: {:?}", self.sort),
        }
    }

    pub fn sort_direction(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination summary returned alongside a page of results.
///
/// All fields are zero when the query matched nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero", default)]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub total_records: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records == 0 {
        return Metadata::default();
    }

    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_ONLY: &[&str] = &["id", "-id"];

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_string(),
            sort_safelist: ID_ONLY,
        }
    }

    fn errors_for(f: &Filters) -> Validator {
        let mut v = Validator::new();
        validate_filters(&mut v, f);
        v
    }

    #[test]
    fn accepts_bounds() {
        assert!(errors_for(&filters(1, 1, "id")).valid());
        assert!(errors_for(&filters(MAX_PAGE, MAX_PAGE_SIZE, "-id")).valid());
    }

    #[test]
    fn rejects_page_out_of_range() {
        for page in [0, -1, MAX_PAGE + 1] {
            let v = errors_for(&filters(page, 20, "id"));
            assert!(v.errors().contains_key("page"), "page {page} accepted");
        }
    }

    #[test]
    fn rejects_page_size_out_of_range() {
        for size in [0, 101] {
            let v = errors_for(&filters(1, size, "id"));
            assert!(v.errors().contains_key("page_size"), "size {size} accepted");
        }
    }

    #[test]
    fn rejects_sort_outside_safelist() {
        for sort in ["name", "i", "--id", "id; DROP TABLE users", ""] {
            let v = errors_for(&filters(1, 20, sort));
            assert_eq!(v.errors().get("sort").map(String::as_str), Some("invalid sort value"));
        }
    }

    #[test]
    fn resolves_descending_sort() {
        let f = filters(1, 20, "-id");
        assert_eq!(f.sort_column(), "id");
        assert_eq!(f.sort_direction(), "DESC");

        let f = filters(1, 20, "id");
        assert_eq!(f.sort_column(), "id");
        assert_eq!(f.sort_direction(), "ASC");
    }

    #[test]
    #[should_panic(expected = "unsafe sort parameter")]
    fn sort_column_panics_outside_safelist() {
        filters(1, 20, "name").sort_column();
    }

    #[test]
    fn limit_and_offset() {
        let f = filters(3, 25, "id");
        assert_eq!(f.limit(), 25);
        assert_eq!(f.offset(), 50);
        assert_eq!(filters(1, 25, "id").offset(), 0);
    }

    #[test]
    fn metadata_for_empty_result_is_zero() {
        let m = calculate_metadata(0, 1, 20);
        assert_eq!(m, Metadata::default());
        assert_eq!(serde_json::to_string(&m).unwrap(), "{}");
    }

    #[test]
    fn metadata_rounds_last_page_up() {
        let m = calculate_metadata(95, 2, 20);
        assert_eq!(
            m,
            Metadata {
                current_page: 2,
                page_size: 20,
                first_page: 1,
                last_page: 5,
                total_records: 95,
            }
        );
        assert_eq!(calculate_metadata(100, 1, 20).last_page, 5);
        assert_eq!(calculate_metadata(1, 1, 100).last_page, 1);
    }
}
