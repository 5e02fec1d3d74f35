/// SQL query functions for database operations
///
/// Every write runs in its own transaction touching exactly one table.
/// Nothing here validates input; `core::Store` does that first.

use crate::db::models::*;
use crate::db::Database;
use crate::error::Result;
use sqlx::Row;
use tracing::debug;

impl Database {
    /// Insert a category and return its new id
    pub async fn insert_category(&self, name: &str, picture: &Blob) -> Result<i64> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO categories (name, picture, picture_type)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(&picture.data)
        .bind(&picture.mime_type)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let id: i64 = row.get(0);
        debug!(id, "category inserted");
        Ok(id)
    }

    /// All categories in insertion order
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        Ok(categories)
    }

    /// Get category by ID
    pub async fn get_category_by_id(&self, id: i64) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(category)
    }

    /// Delete a category
    ///
    /// Returns whether a row was removed. Items pointing at it are left alone.
    pub async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool().begin().await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert an item and return its new id
    pub async fn insert_item(
        &self,
        category_id: i64,
        name: &str,
        picture: &Blob,
        sound: &Blob,
    ) -> Result<i64> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO items (category_id, name, picture, picture_type, sound, sound_type)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(category_id)
        .bind(name)
        .bind(&picture.data)
        .bind(&picture.mime_type)
        .bind(&sound.data)
        .bind(&sound.mime_type)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let id: i64 = row.get(0);
        debug!(id, category_id, "item inserted");
        Ok(id)
    }

    /// Items filed under a category, served by `idx_items_category_id`
    pub async fn list_items_by_category(&self, category_id: i64) -> Result<Vec<Item>> {
        let items =
            sqlx::query_as::<_, Item>("SELECT * FROM items WHERE category_id = ? ORDER BY id")
                .bind(category_id)
                .fetch_all(self.pool())
                .await?;

        Ok(items)
    }

    /// Get item by ID
    pub async fn get_item_by_id(&self, id: i64) -> Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(item)
    }

    /// Delete an item
    ///
    /// Returns whether a row was removed.
    pub async fn delete_item(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool().begin().await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(byte: u8) -> Blob {
        Blob::new("image/png", vec![0x89, b'P', b'N', b'G', byte])
    }

    fn webm(byte: u8) -> Blob {
        Blob::new("audio/webm", vec![0x1a, 0x45, 0xdf, 0xa3, byte])
    }

    #[tokio::test]
    async fn test_insert_and_retrieve_category() {
        let db = Database::new_test().await.unwrap();

        let id = db.insert_category("Animals", &png(1)).await.unwrap();
        assert!(id > 0);

        let category = db.get_category_by_id(id).await.unwrap().unwrap();
        assert_eq!(category.name, "Animals");
        assert_eq!(category.picture, png(1));
    }

    #[tokio::test]
    async fn test_list_categories_in_insertion_order() {
        let db = Database::new_test().await.unwrap();

        for name in ["Animals", "Vehicles", "Food"] {
            db.insert_category(name, &png(0)).await.unwrap();
        }

        let names: Vec<String> = db
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Animals", "Vehicles", "Food"]);
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let db = Database::new_test().await.unwrap();

        let first = db.insert_category("Animals", &png(1)).await.unwrap();
        assert!(db.delete_category(first).await.unwrap());

        let second = db.insert_category("Animals", &png(1)).await.unwrap();
        assert!(second > first);

        let item = db.insert_item(second, "Dog", &png(2), &webm(1)).await.unwrap();
        db.delete_item(item).await.unwrap();
        let next_item = db.insert_item(second, "Cat", &png(3), &webm(2)).await.unwrap();
        assert!(next_item > item);
    }

    #[tokio::test]
    async fn test_items_filtered_by_category() {
        let db = Database::new_test().await.unwrap();

        db.insert_item(1, "Dog", &png(1), &webm(1)).await.unwrap();
        db.insert_item(1, "Cat", &png(2), &webm(2)).await.unwrap();
        db.insert_item(2, "Bus", &png(3), &webm(3)).await.unwrap();

        let animals = db.list_items_by_category(1).await.unwrap();
        assert_eq!(animals.len(), 2);
        assert!(animals.iter().all(|i| i.category_id == 1));

        let vehicles = db.list_items_by_category(2).await.unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].name, "Bus");
        assert_eq!(vehicles[0].sound, webm(3));
    }

    #[tokio::test]
    async fn test_delete_missing_rows() {
        let db = Database::new_test().await.unwrap();

        assert!(!db.delete_category(42).await.unwrap());
        assert!(!db.delete_item(42).await.unwrap());
        assert!(db.get_item_by_id(42).await.unwrap().is_none());
    }
}
