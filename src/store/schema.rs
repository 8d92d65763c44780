//! Table metadata shared by the SQL helpers in [`super::postgres`].

use crate::models::history::{PriceHistory, StockHistory};
use crate::models::product::Product;

pub trait Table {
    const NAME: &'static str;
    const COLUMNS: &'static [&'static str];

    fn column_list() -> String {
        Self::COLUMNS.join(", ")
    }

    fn select_sql() -> String {
        format!("SELECT {} FROM {}", Self::column_list(), Self::NAME)
    }

    fn returning_sql() -> String {
        format!("RETURNING {}", Self::column_list())
    }

    fn delete_by_id_sql() -> String {
        format!("DELETE FROM {} WHERE id = $1", Self::NAME)
    }
}

/// History tables: rows hang off a product and are listed newest first.
pub trait HistoryTable: Table {
    fn list_for_product_sql() -> String {
        format!(
            "{} WHERE product_id = $1 ORDER BY changed_at DESC, id DESC",
            Self::select_sql()
        )
    }
}

impl Table for Product {
    const NAME: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "price",
        "stock_quantity",
        "created_at",
        "updated_at",
    ];
}

impl Table for PriceHistory {
    const NAME: &'static str = "price_history";
    const COLUMNS: &'static [&'static str] =
        &["id", "product_id", "old_price", "new_price", "changed_at"];
}

impl HistoryTable for PriceHistory {}

impl Table for StockHistory {
    const NAME: &'static str = "stock_history";
    const COLUMNS: &'static [&'static str] =
        &["id", "product_id", "old_quantity", "new_quantity", "changed_at"];
}

impl HistoryTable for StockHistory {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_lists_every_column() {
        assert_eq!(
            Product::select_sql(),
            "SELECT id, name, price, stock_quantity, created_at, updated_at FROM products"
        );
    }

    #[test]
    fn delete_targets_the_table_name() {
        assert_eq!(Product::delete_by_id_sql(), "DELETE FROM products WHERE id = $1");
        assert_eq!(
            PriceHistory::delete_by_id_sql(),
            "DELETE FROM price_history WHERE id = $1"
        );
    }

    #[test]
    fn history_is_listed_newest_first() {
        assert_eq!(
            StockHistory::list_for_product_sql(),
            "SELECT id, product_id, old_quantity, new_quantity, changed_at FROM stock_history \
             WHERE product_id = $1 ORDER BY changed_at DESC, id DESC"
        );
    }
}
