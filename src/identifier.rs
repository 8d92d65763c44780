/// How a path segment addresses a product: numeric segments are ids,
/// anything else is an exact (case-insensitive) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    ById(i64),
    ByName(String),
}

impl Identifier {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(id) => Identifier::ById(id),
            Err(_) => Identifier::ByName(raw.to_string()),
        }
    }
}
