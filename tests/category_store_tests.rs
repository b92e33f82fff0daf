use tallybook::core::{Category, CategoryDraft, NO_CATEGORY_ID};
use tallybook::store::{SqliteStore, StoreError};

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

/// Full nested-set well-formedness check over the whole table.
fn assert_invariants(store: &SqliteStore) {
    let all = store.all_categories(true).unwrap();
    let mut bounds: Vec<i64> = all.iter().flat_map(|c| [c.left, c.right]).collect();
    bounds.sort_unstable();
    let expected: Vec<i64> = (0..bounds.len() as i64).collect();
    assert_eq!(bounds, expected, "bounds must form a contiguous sequence");
    for c in &all {
        assert!(c.left < c.right, "category {} must keep left < right", c.id);
    }
    for a in &all {
        for b in &all {
            if a.id == b.id {
                continue;
            }
            let disjoint = a.right < b.left || b.right < a.left;
            assert!(
                disjoint || a.contains(b) || b.contains(a),
                "categories {} and {} must nest or be disjoint",
                a.id,
                b.id
            );
        }
    }
}

fn layout(store: &SqliteStore) -> Vec<(i64, i64, i64)> {
    store
        .all_categories(true)
        .unwrap()
        .iter()
        .map(|c| (c.id, c.left, c.right))
        .collect()
}

#[test]
fn fresh_store_has_only_the_sentinel() {
    let store = store();
    let root = store.category(NO_CATEGORY_ID).unwrap();
    assert_eq!((root.left, root.right), (0, 1));
    assert!(store.all_categories(false).unwrap().is_empty());
}

#[test]
fn insert_into_empty_tree() {
    let mut store = store();
    let id = store.insert_child_category(NO_CATEGORY_ID, "Groceries").unwrap();
    let groceries = store.category(id).unwrap();
    assert_eq!((groceries.left, groceries.right), (1, 2));
    let root = store.category(NO_CATEGORY_ID).unwrap();
    assert_eq!((root.left, root.right), (0, 3));
    assert_invariants(&store);
}

#[test]
fn sibling_insert_lands_after_its_mate() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let b = store.insert_sibling_category(a, "B").unwrap();
    let children = store.children(NO_CATEGORY_ID).unwrap();
    let ids: Vec<i64> = children.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![a, b]);
    assert_invariants(&store);
}

#[test]
fn child_insert_pivots_on_the_parents_left_bound() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let first = store.insert_child_category(a, "first").unwrap();
    let second = store.insert_child_category(a, "second").unwrap();
    // insert_child pivots on the parent's left bound, so the newest child
    // sits first in interval order
    let ids: Vec<i64> = store.children(a).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![second, first]);
    assert_invariants(&store);
}

#[test]
fn insert_or_update_keeps_children_sorted_by_title() {
    let mut store = store();
    for title in ["Food", "Auto", "Zoo", "Med"] {
        store
            .insert_or_update_category(&CategoryDraft::new(NO_CATEGORY_ID, title), &[])
            .unwrap();
    }
    let titles: Vec<String> = store
        .children(NO_CATEGORY_ID)
        .unwrap()
        .into_iter()
        .map(|c| c.title)
        .collect();
    assert_eq!(titles, vec!["Auto", "Food", "Med", "Zoo"]);
    assert_invariants(&store);
}

#[test]
fn insert_then_delete_restores_the_exact_layout() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    store.insert_child_category(a, "A1").unwrap();
    let before = layout(&store);
    let x = store.insert_child_category(NO_CATEGORY_ID, "X").unwrap();
    assert_ne!(layout(&store), before);
    store.delete_category(x).unwrap();
    assert_eq!(layout(&store), before);
    assert_invariants(&store);
}

#[test]
fn subtree_query_is_idempotent() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    store.insert_child_category(a, "A1").unwrap();
    store.insert_child_category(a, "A2").unwrap();
    let first = store.subtree(a).unwrap();
    let second = store.subtree(a).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn move_under_later_sibling() {
    // root (0,7), A(1,2), B(3,6) with child C(4,5)
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let b = store.insert_sibling_category(a, "B").unwrap();
    let c = store.insert_child_category(b, "C").unwrap();
    let check = |store: &SqliteStore, id: i64, left: i64, right: i64| {
        let cat = store.category(id).unwrap();
        assert_eq!((cat.left, cat.right), (left, right), "bounds of {id}");
    };
    check(&store, NO_CATEGORY_ID, 0, 7);
    check(&store, a, 1, 2);
    check(&store, b, 3, 6);
    check(&store, c, 4, 5);

    store.move_category(a, b, "A").unwrap();

    check(&store, NO_CATEGORY_ID, 0, 7);
    check(&store, b, 1, 6);
    check(&store, c, 2, 3);
    check(&store, a, 4, 5);
    assert_eq!(store.parent_of(a).unwrap().unwrap().id, b);
    assert_eq!(store.parent_of(c).unwrap().unwrap().id, b);
    assert_invariants(&store);
}

#[test]
fn move_under_earlier_sibling() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let b = store.insert_sibling_category(a, "B").unwrap();
    let c = store.insert_child_category(b, "C").unwrap();

    store.move_category(c, a, "C").unwrap();

    assert_eq!(store.parent_of(c).unwrap().unwrap().id, a);
    let a_cat = store.category(a).unwrap();
    let c_cat = store.category(c).unwrap();
    assert!(a_cat.contains(&c_cat));
    let b_cat = store.category(b).unwrap();
    assert_eq!(b_cat.width(), 2, "B must shrink back to a leaf");
    assert_invariants(&store);
}

#[test]
fn move_whole_subtree_keeps_descendants() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let b = store.insert_sibling_category(a, "B").unwrap();
    let b1 = store.insert_child_category(b, "B1").unwrap();
    let b2 = store.insert_sibling_category(b1, "B2").unwrap();

    store.move_category(b, a, "B").unwrap();

    assert_eq!(store.parent_of(b).unwrap().unwrap().id, a);
    assert_eq!(store.parent_of(b1).unwrap().unwrap().id, b);
    assert_eq!(store.parent_of(b2).unwrap().unwrap().id, b);
    let subtree: Vec<i64> = store.subtree(b).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(subtree, vec![b, b1, b2]);
    assert_invariants(&store);
}

#[test]
fn move_into_own_subtree_is_rejected() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let a1 = store.insert_child_category(a, "A1").unwrap();
    let before = layout(&store);
    let err = store.move_category(a, a1, "A").unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert_eq!(layout(&store), before, "failed move must not change the tree");
}

#[test]
fn deleting_a_leaf_closes_the_gap_by_its_width() {
    // root(0,7), A(1,4) { B(2,3) }, C(5,6); deleting C drops width 2.
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let b = store.insert_child_category(a, "B").unwrap();
    let c = store.insert_sibling_category(a, "C").unwrap();
    let cat = store.category(c).unwrap();
    assert_eq!((cat.left, cat.right), (5, 6));

    store.delete_category(c).unwrap();

    let root = store.category(NO_CATEGORY_ID).unwrap();
    assert_eq!((root.left, root.right), (0, 5));
    let a_cat = store.category(a).unwrap();
    assert_eq!((a_cat.left, a_cat.right), (1, 4));
    let b_cat = store.category(b).unwrap();
    assert_eq!((b_cat.left, b_cat.right), (2, 3));
    assert!(store.category(c).unwrap().is_empty_node());
    assert_invariants(&store);
}

#[test]
fn deleting_a_subtree_removes_descendants_and_reassigns_references() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let a1 = store.insert_child_category(a, "A1").unwrap();
    let keep = store.insert_sibling_category(a, "Keep").unwrap();

    let account = store.create_account("Cash", "Cash", "USD").unwrap();
    let mut txn = tallybook::core::Transaction::new(
        chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        account,
        -500,
    );
    txn.category_id = a1;
    let txn_id = store.insert_transaction(&txn).unwrap();

    store.delete_category(a).unwrap();

    assert!(store.category(a).unwrap().is_empty_node());
    assert!(store.category(a1).unwrap().is_empty_node());
    assert!(!store.category(keep).unwrap().is_empty_node());
    let reassigned = store.transaction(txn_id).unwrap().unwrap();
    assert_eq!(reassigned.category_id, NO_CATEGORY_ID);
    assert_invariants(&store);
}

#[test]
fn sentinel_cannot_be_deleted_or_moved() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    assert!(matches!(
        store.delete_category(NO_CATEGORY_ID),
        Err(StoreError::InvalidInput(_))
    ));
    assert!(matches!(
        store.move_category(NO_CATEGORY_ID, a, "root"),
        Err(StoreError::InvalidInput(_))
    ));
}

#[test]
fn unknown_ids_yield_the_empty_node_on_reads_and_errors_on_writes() {
    let mut store = store();
    let missing = store.category(999).unwrap();
    assert!(missing.is_empty_node());
    assert!(store.subtree(999).unwrap().is_empty());
    assert!(matches!(
        store.insert_child_category(999, "X"),
        Err(StoreError::CategoryNotFound(999))
    ));
    assert!(matches!(
        store.delete_category(999),
        Err(StoreError::CategoryNotFound(999))
    ));
}

#[test]
fn parent_and_ancestor_path() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "a").unwrap();
    let b = store.insert_child_category(a, "b").unwrap();
    let c = store.insert_child_category(b, "c").unwrap();

    assert_eq!(store.parent_of(c).unwrap().unwrap().id, b);
    assert_eq!(store.parent_of(a).unwrap(), None, "top level has no parent");
    let path: Vec<String> = store
        .ancestor_path(c)
        .unwrap()
        .into_iter()
        .map(|cat| cat.title)
        .collect();
    assert_eq!(path, vec!["a", "b"]);

    let c_cat = store.category(c).unwrap();
    assert_eq!(c_cat.level, 3);
    assert_eq!(c_cat.parent_id, Some(b));
}

#[test]
fn rename_keeps_intervals() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "Old").unwrap();
    let before = store.category(a).unwrap();
    store.rename_category(a, "New").unwrap();
    let after = store.category(a).unwrap();
    assert_eq!(after.title, "New");
    assert_eq!((after.left, after.right), (before.left, before.right));
}

#[test]
fn insert_or_update_moves_when_the_parent_changes() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let b = store.insert_sibling_category(a, "B").unwrap();
    let x = store
        .insert_or_update_category(&CategoryDraft::new(a, "X"), &[])
        .unwrap();
    assert_eq!(store.parent_of(x).unwrap().unwrap().id, a);

    store
        .insert_or_update_category(&CategoryDraft::existing(x, b, "X"), &[])
        .unwrap();
    assert_eq!(store.parent_of(x).unwrap().unwrap().id, b);
    assert_invariants(&store);
}

#[test]
fn attribute_links_are_replaced_wholesale() {
    let mut store = store();
    let color = store.create_attribute("color").unwrap();
    let priority = store.create_attribute("priority").unwrap();
    let draft = CategoryDraft::new(NO_CATEGORY_ID, "Tagged");
    let id = store.insert_or_update_category(&draft, &[color]).unwrap();
    let titles: Vec<String> = store
        .attributes_for_category(id)
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["color"]);

    store
        .insert_or_update_category(&CategoryDraft::existing(id, NO_CATEGORY_ID, "Tagged"), &[priority])
        .unwrap();
    let titles: Vec<String> = store
        .attributes_for_category(id)
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["priority"]);
}

#[test]
fn bulk_tree_rewrite_applies_a_new_numbering() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let b = store.insert_sibling_category(a, "B").unwrap();

    let mut tree = store.category_tree(false).unwrap();
    tree.roots.swap(0, 1);
    tree.renumber(1);
    store.update_category_tree(&tree).unwrap();

    let ids: Vec<i64> = store
        .children(NO_CATEGORY_ID)
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![b, a]);
    assert_invariants(&store);
}

#[test]
fn categories_without_subtree_masks_the_target() {
    let mut store = store();
    let a = store.insert_child_category(NO_CATEGORY_ID, "A").unwrap();
    let a1 = store.insert_child_category(a, "A1").unwrap();
    let b = store.insert_sibling_category(a, "B").unwrap();
    let visible: Vec<i64> = store
        .categories_without_subtree(a)
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(visible, vec![b]);
    assert!(!visible.contains(&a1));
}

#[test]
fn ensure_category_path_creates_each_missing_segment_once() {
    let mut store = store();
    let deep = store
        .ensure_category_path(&"expenses:food:coffee".into())
        .unwrap();
    let again = store
        .ensure_category_path(&"expenses:food:coffee".into())
        .unwrap();
    assert_eq!(deep, again);
    let sibling = store.ensure_category_path(&"expenses:rent".into()).unwrap();
    assert_ne!(deep, sibling);
    assert_eq!(store.all_categories(false).unwrap().len(), 4);
    let path: Vec<String> = store
        .ancestor_path(deep)
        .unwrap()
        .into_iter()
        .map(|c: Category| c.title)
        .collect();
    assert_eq!(path, vec!["expenses", "food"]);
    assert_invariants(&store);
}
