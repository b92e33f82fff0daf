//! Nested-set category storage.
//!
//! Each category row carries `lft`/`rgt` interval bounds; descendants nest
//! strictly inside their ancestors' intervals. Structural mutations rewrite
//! bounds with bulk range updates inside a single transaction, so a crash
//! mid-operation leaves the previous tree intact.

use rusqlite::{OptionalExtension, Row, Transaction, params};
use std::collections::HashMap;
use tracing::debug;

use super::{SqliteStore, StoreError};
use crate::core::{
    Attribute, Category, CategoryDraft, CategoryPath, CategoryTree, NO_CATEGORY_ID,
};

const SHIFT_RIGHT_SQL: &str = "UPDATE category SET rgt = rgt + 2 WHERE rgt > ?1";
const SHIFT_LEFT_SQL: &str = "UPDATE category SET lft = lft + 2 WHERE lft > ?1";

const PARENT_SQL: &str = "SELECT parent.id, parent.title, parent.lft, parent.rgt
     FROM category AS node, category AS parent
     WHERE node.lft BETWEEN parent.lft AND parent.rgt
       AND node.id = ?1 AND parent.id != ?1
     ORDER BY parent.lft DESC
     LIMIT 1";

const ANCESTORS_SQL: &str = "SELECT parent.id, parent.title, parent.lft, parent.rgt
     FROM category AS node, category AS parent
     WHERE node.lft BETWEEN parent.lft AND parent.rgt
       AND node.id = ?1 AND parent.id != ?1 AND parent.id != 0
     ORDER BY parent.lft";

// Depth-1 descendants of ?1: count enclosing ancestors relative to the
// subtree root and keep the nodes exactly one level below it.
const CHILDREN_SQL: &str = "SELECT node.id, node.title, node.lft, node.rgt,
            COUNT(parent.id) - (sub_tree.depth + 1) AS level
     FROM category AS node,
          category AS parent,
          category AS sub_parent,
          (SELECT node.id AS id, COUNT(parent.id) - 1 AS depth
           FROM category AS node, category AS parent
           WHERE node.lft BETWEEN parent.lft AND parent.rgt
             AND node.id = ?1
           GROUP BY node.id) AS sub_tree
     WHERE node.lft BETWEEN parent.lft AND parent.rgt
       AND node.lft BETWEEN sub_parent.lft AND sub_parent.rgt
       AND sub_parent.id = sub_tree.id
     GROUP BY node.id
     HAVING level = 1
     ORDER BY node.lft";

// Re-parenting as pure interval arithmetic, one bulk statement, no recursive
// descent. ?1 = origin lft, ?2 = origin rgt, ?3 = new parent's rgt.
const MOVE_SQL: &str = "UPDATE category SET
       lft = lft + CASE
           WHEN ?3 < ?1 THEN CASE
               WHEN lft BETWEEN ?1 AND ?2 THEN ?3 - ?1
               WHEN lft BETWEEN ?3 AND ?1 - 1 THEN ?2 - ?1 + 1
               ELSE 0 END
           WHEN ?3 > ?2 THEN CASE
               WHEN lft BETWEEN ?1 AND ?2 THEN ?3 - ?2 - 1
               WHEN lft BETWEEN ?2 + 1 AND ?3 - 1 THEN ?1 - ?2 - 1
               ELSE 0 END
           ELSE 0 END,
       rgt = rgt + CASE
           WHEN ?3 < ?1 THEN CASE
               WHEN rgt BETWEEN ?1 AND ?2 THEN ?3 - ?1
               WHEN rgt BETWEEN ?3 AND ?1 - 1 THEN ?2 - ?1 + 1
               ELSE 0 END
           WHEN ?3 > ?2 THEN CASE
               WHEN rgt BETWEEN ?1 AND ?2 THEN ?3 - ?2 - 1
               WHEN rgt BETWEEN ?2 + 1 AND ?3 - 1 THEN ?1 - ?2 - 1
               ELSE 0 END
           ELSE 0 END";

impl SqliteStore {
    /// Inserts a new category directly inside `parent_id`, at the head of
    /// its child list in interval order.
    pub fn insert_child_category(
        &mut self,
        parent_id: i64,
        title: &str,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let id = insert_child_tx(&tx, parent_id, title)?;
        tx.commit()?;
        debug!(id, parent_id, title, "Inserted child category");
        Ok(id)
    }

    /// Inserts a new category immediately after the sibling `after_id`.
    pub fn insert_sibling_category(
        &mut self,
        after_id: i64,
        title: &str,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let id = insert_sibling_tx(&tx, after_id, title)?;
        tx.commit()?;
        debug!(id, after_id, title, "Inserted sibling category");
        Ok(id)
    }

    /// Inserts a new category keeping the parent's children sorted by title,
    /// or updates an existing one (rename in place, or move when the parent
    /// changed), then replaces its attribute links. One transaction.
    pub fn insert_or_update_category(
        &mut self,
        draft: &CategoryDraft,
        attribute_ids: &[i64],
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let id = if draft.is_new() {
            insert_sorted_tx(&tx, draft.parent_id, &draft.title)?
        } else {
            let current_parent = parent_tx(&tx, draft.id)?
                .map(|p| p.id)
                .unwrap_or(NO_CATEGORY_ID);
            if current_parent == draft.parent_id {
                rename_tx(&tx, draft.id, &draft.title)?;
            } else {
                move_tx(&tx, draft.id, draft.parent_id, &draft.title)?;
            }
            draft.id
        };
        replace_attributes_tx(&tx, id, attribute_ids)?;
        tx.commit()?;
        debug!(id, title = draft.title.as_str(), "Upserted category");
        Ok(id)
    }

    /// Renames `id` and re-parents it under `new_parent_id`, rewriting every
    /// affected interval with one bulk update.
    pub fn move_category(
        &mut self,
        id: i64,
        new_parent_id: i64,
        title: &str,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        move_tx(&tx, id, new_parent_id, title)?;
        tx.commit()?;
        debug!(id, new_parent_id, title, "Moved category");
        Ok(())
    }

    /// Deletes `id` and its whole subtree, re-pointing transactions and
    /// splits at the sentinel and closing the interval gap.
    pub fn delete_category(&mut self, id: i64) -> Result<(), StoreError> {
        if id == NO_CATEGORY_ID {
            return Err(StoreError::InvalidInput(
                "the sentinel category cannot be deleted",
            ));
        }
        let tx = self.conn.transaction()?;
        let (left, right) = bounds_tx(&tx, id)?.ok_or(StoreError::CategoryNotFound(id))?;
        let width = right - left + 1;
        tx.execute(
            "UPDATE txn SET category_id = 0 WHERE category_id IN
                 (SELECT id FROM category WHERE lft BETWEEN ?1 AND ?2)",
            params![left, right],
        )?;
        tx.execute(
            "UPDATE txn_split SET category_id = 0 WHERE category_id IN
                 (SELECT id FROM category WHERE lft BETWEEN ?1 AND ?2)",
            params![left, right],
        )?;
        let removed = tx.execute(
            "DELETE FROM category WHERE lft BETWEEN ?1 AND ?2",
            params![left, right],
        )?;
        tx.execute(
            "UPDATE category SET
                 lft = CASE WHEN lft > ?1 THEN lft - ?2 ELSE lft END,
                 rgt = rgt - ?2
             WHERE rgt > ?3",
            params![left, width, right],
        )?;
        tx.commit()?;
        debug!(id, removed, "Deleted category subtree");
        Ok(())
    }

    /// Renames a category without touching its interval.
    pub fn rename_category(&mut self, id: i64, title: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        rename_tx(&tx, id, title)?;
        tx.commit()?;
        Ok(())
    }

    /// Single-category lookup with derived level and immediate parent.
    /// A missing id yields the empty node, per the store's convention.
    pub fn category(&self, id: i64) -> Result<Category, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT id, title, lft, rgt, level FROM v_category WHERE id = ?1",
                params![id],
                category_from_view_row,
            )
            .optional()?;
        let Some(mut category) = found else {
            return Ok(Category::empty());
        };
        category.parent_id = self
            .conn
            .query_row(PARENT_SQL, params![id], |row| row.get::<_, i64>(0))
            .optional()?
            .filter(|pid| *pid != NO_CATEGORY_ID);
        Ok(category)
    }

    /// Lookup by left bound; the empty node when no interval starts there.
    pub fn category_by_left(&self, left: i64) -> Result<Category, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, title, lft, rgt, level FROM v_category WHERE lft = ?1",
                params![left],
                category_from_view_row,
            )
            .optional()?
            .unwrap_or_else(Category::empty))
    }

    /// Immediate parent: innermost enclosing interval, sentinel excluded.
    pub fn parent_of(&self, id: i64) -> Result<Option<Category>, StoreError> {
        Ok(self
            .conn
            .query_row(PARENT_SQL, params![id], category_from_bounds_row)
            .optional()?
            .filter(|c| !c.is_sentinel()))
    }

    /// Ancestor chain outermost-first, sentinel excluded.
    pub fn ancestor_path(&self, id: i64) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self.conn.prepare(ANCESTORS_SQL)?;
        let rows = stmt.query_map(params![id], category_from_bounds_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All nodes whose interval is contained in the target's, in left order.
    /// Includes the target itself; empty when the id is unknown.
    pub fn subtree(&self, id: i64) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT v.id, v.title, v.lft, v.rgt, v.level FROM v_category v
             WHERE v.lft >= (SELECT lft FROM category WHERE id = ?1)
               AND v.rgt <= (SELECT rgt FROM category WHERE id = ?1)
             ORDER BY v.lft",
        )?;
        let rows = stmt.query_map(params![id], category_from_view_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Children one level below `parent_id`, in interval order. Title order
    /// is enforced at insert time, not by a sort key.
    pub fn children(&self, parent_id: i64) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self.conn.prepare(CHILDREN_SQL)?;
        let rows = stmt.query_map(params![parent_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                title: row.get(1)?,
                left: row.get(2)?,
                right: row.get(3)?,
                level: row.get(4)?,
                parent_id: Some(parent_id),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Flat listing in left order. The sentinel is excluded unless asked for.
    pub fn all_categories(&self, include_sentinel: bool) -> Result<Vec<Category>, StoreError> {
        let sql = if include_sentinel {
            "SELECT id, title, lft, rgt, level FROM v_category ORDER BY lft"
        } else {
            "SELECT id, title, lft, rgt, level FROM v_category WHERE id != 0 ORDER BY lft"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], category_from_view_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Flat listing with one subtree masked out, e.g. to offer move targets
    /// that exclude the node being moved.
    pub fn categories_without_subtree(&self, id: i64) -> Result<Vec<Category>, StoreError> {
        let (left, right) = self
            .conn
            .query_row(
                "SELECT lft, rgt FROM category WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?
            .unwrap_or((0, 0));
        let mut stmt = self.conn.prepare(
            "SELECT id, title, lft, rgt, level FROM v_category
             WHERE id != 0 AND NOT (lft >= ?1 AND rgt <= ?2)
             ORDER BY lft",
        )?;
        let rows = stmt.query_map(params![left, right], category_from_view_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn category_tree(&self, include_sentinel: bool) -> Result<CategoryTree, StoreError> {
        Ok(CategoryTree::from_flat(
            self.all_categories(include_sentinel)?,
        ))
    }

    pub fn category_map(&self, include_sentinel: bool) -> Result<HashMap<i64, Category>, StoreError> {
        Ok(self
            .all_categories(include_sentinel)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    /// Bulk rewrite of every node's bounds from an in-memory tree, in one
    /// transaction. The tree is trusted to carry a consistent numbering.
    pub fn update_category_tree(&mut self, tree: &CategoryTree) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE category SET lft = ?1, rgt = ?2 WHERE id = ?3")?;
            for category in tree.iter() {
                stmt.execute(params![category.left, category.right, category.id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Resolves a colon-separated path to a category id, creating missing
    /// segments along the way. Empty paths resolve to the sentinel.
    pub fn ensure_category_path(&mut self, path: &CategoryPath) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let mut parent_id = NO_CATEGORY_ID;
        for segment in path.segments() {
            let existing = children_tx(&tx, parent_id)?
                .into_iter()
                .find(|c| c.title == segment);
            parent_id = match existing {
                Some(c) => c.id,
                None => insert_sorted_tx(&tx, parent_id, segment)?,
            };
        }
        tx.commit()?;
        Ok(parent_id)
    }

    pub fn create_attribute(&mut self, title: &str) -> Result<i64, StoreError> {
        self.conn
            .execute("INSERT INTO attribute (title) VALUES (?1)", params![title])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn attributes_for_category(&self, category_id: i64) -> Result<Vec<Attribute>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.title FROM attribute a
             JOIN category_attribute ca ON ca.attribute_id = a.id
             WHERE ca.category_id = ?1
             ORDER BY a.id",
        )?;
        let rows = stmt.query_map(params![category_id], |row| {
            Ok(Attribute {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn category_from_view_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        title: row.get(1)?,
        left: row.get(2)?,
        right: row.get(3)?,
        level: row.get(4)?,
        parent_id: None,
    })
}

fn category_from_bounds_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        title: row.get(1)?,
        left: row.get(2)?,
        right: row.get(3)?,
        level: 0,
        parent_id: None,
    })
}

fn bounds_tx(tx: &Transaction<'_>, id: i64) -> Result<Option<(i64, i64)>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT lft, rgt FROM category WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?)
}

fn insert_at_tx(tx: &Transaction<'_>, pivot: i64, title: &str) -> Result<i64, StoreError> {
    tx.execute(SHIFT_RIGHT_SQL, params![pivot])?;
    tx.execute(SHIFT_LEFT_SQL, params![pivot])?;
    tx.execute(
        "INSERT INTO category (title, lft, rgt) VALUES (?1, ?2, ?3)",
        params![title, pivot + 1, pivot + 2],
    )?;
    Ok(tx.last_insert_rowid())
}

fn insert_child_tx(tx: &Transaction<'_>, parent_id: i64, title: &str) -> Result<i64, StoreError> {
    let (left, _) = bounds_tx(tx, parent_id)?.ok_or(StoreError::CategoryNotFound(parent_id))?;
    insert_at_tx(tx, left, title)
}

fn insert_sibling_tx(tx: &Transaction<'_>, after_id: i64, title: &str) -> Result<i64, StoreError> {
    let (_, right) = bounds_tx(tx, after_id)?.ok_or(StoreError::CategoryNotFound(after_id))?;
    insert_at_tx(tx, right, title)
}

/// Places a new node among `parent_id`'s children so titles stay sorted:
/// append as child when no existing child's title precedes it, otherwise
/// insert after the last one that does.
fn insert_sorted_tx(tx: &Transaction<'_>, parent_id: i64, title: &str) -> Result<i64, StoreError> {
    let mut mate_id = None;
    for child in children_tx(tx, parent_id)? {
        if title <= child.title.as_str() {
            break;
        }
        mate_id = Some(child.id);
    }
    match mate_id {
        Some(after) => insert_sibling_tx(tx, after, title),
        None => insert_child_tx(tx, parent_id, title),
    }
}

fn children_tx(tx: &Transaction<'_>, parent_id: i64) -> Result<Vec<Category>, StoreError> {
    let mut stmt = tx.prepare(CHILDREN_SQL)?;
    let rows = stmt.query_map(params![parent_id], |row| {
        Ok(Category {
            id: row.get(0)?,
            title: row.get(1)?,
            left: row.get(2)?,
            right: row.get(3)?,
            level: row.get(4)?,
            parent_id: Some(parent_id),
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn parent_tx(tx: &Transaction<'_>, id: i64) -> Result<Option<Category>, StoreError> {
    Ok(tx
        .query_row(PARENT_SQL, params![id], category_from_bounds_row)
        .optional()?)
}

fn rename_tx(tx: &Transaction<'_>, id: i64, title: &str) -> Result<(), StoreError> {
    let changed = tx.execute(
        "UPDATE category SET title = ?1 WHERE id = ?2",
        params![title, id],
    )?;
    if changed == 0 {
        return Err(StoreError::CategoryNotFound(id));
    }
    Ok(())
}

fn move_tx(
    tx: &Transaction<'_>,
    id: i64,
    new_parent_id: i64,
    title: &str,
) -> Result<(), StoreError> {
    if id == NO_CATEGORY_ID {
        return Err(StoreError::InvalidInput(
            "the sentinel category cannot be moved",
        ));
    }
    rename_tx(tx, id, title)?;
    let (origin_left, origin_right) =
        bounds_tx(tx, id)?.ok_or(StoreError::CategoryNotFound(id))?;
    let (_, new_parent_right) =
        bounds_tx(tx, new_parent_id)?.ok_or(StoreError::CategoryNotFound(new_parent_id))?;
    if new_parent_right >= origin_left && new_parent_right <= origin_right {
        return Err(StoreError::InvalidInput(
            "cannot move a category under its own subtree",
        ));
    }
    tx.execute(MOVE_SQL, params![origin_left, origin_right, new_parent_right])?;
    Ok(())
}

fn replace_attributes_tx(
    tx: &Transaction<'_>,
    category_id: i64,
    attribute_ids: &[i64],
) -> Result<(), StoreError> {
    tx.execute(
        "DELETE FROM category_attribute WHERE category_id = ?1",
        params![category_id],
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO category_attribute (category_id, attribute_id) VALUES (?1, ?2)",
    )?;
    for attribute_id in attribute_ids {
        stmt.execute(params![category_id, attribute_id])?;
    }
    Ok(())
}
