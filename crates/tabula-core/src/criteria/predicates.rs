use super::predicate::Predicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

/// Filter, sort and paging for one query
///
/// Top-level predicates are AND-ed together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicates {
    predicates: Vec<Predicate>,
    sorts: Vec<Sort>,
    page: Option<i64>,
    page_size: Option<i64>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, predicate: Predicate) -> &mut Self {
        self.predicates.push(predicate);
        self
    }

    /// Append one sort key per column; repeated calls extend the ordering
    pub fn sort<C, I>(&mut self, direction: SortDirection, columns: I) -> &mut Self
    where
        C: Into<String>,
        I: IntoIterator<Item = C>,
    {
        self.sorts.extend(columns.into_iter().map(|c| Sort {
            column: c.into(),
            direction,
        }));
        self
    }

    /// 1-based page number; validated at compile time
    pub fn set_page(&mut self, page: i64) -> &mut Self {
        self.page = Some(page);
        self
    }

    pub fn set_page_size(&mut self, page_size: i64) -> &mut Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn page(&self) -> Option<i64> {
        self.page
    }

    pub fn page_size(&self) -> Option<i64> {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_calls_compose_in_order() {
        let mut p = Predicates::new();
        p.sort(SortDirection::Desc, ["age"])
            .sort(SortDirection::Asc, ["last", "first"]);

        let keys: Vec<(&str, SortDirection)> = p
            .sorts()
            .iter()
            .map(|s| (s.column.as_str(), s.direction))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("age", SortDirection::Desc),
                ("last", SortDirection::Asc),
                ("first", SortDirection::Asc),
            ]
        );
    }
}
