use chrono::{TimeZone, Utc};

use tallybook::core::recurrence::{self, ScheduledTransaction};
use tallybook::core::{NO_CATEGORY_ID, Transaction};
use tallybook::store::SqliteStore;

fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn store_with_template(recurrence: Option<&str>) -> (SqliteStore, i64, i64) {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let account = store.create_account("Checking", "Bank", "USD").unwrap();
    let mut template = Transaction::new(at(2024, 1, 1, 9), account, -120000);
    template.payee = "Landlord".to_string();
    let id = store
        .insert_scheduled_transaction(&template, recurrence)
        .unwrap();
    (store, account, id)
}

#[test]
fn stored_templates_come_back_as_schedules() {
    // 09:00 on the first of every month
    let (store, _, id) = store_with_template(Some("0 0 9 1 * * *"));
    let schedules = store.scheduled_transactions().unwrap();
    assert_eq!(schedules.len(), 1);
    let s = &schedules[0];
    assert_eq!(s.id, id);
    assert_eq!(s.start, Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
    assert_eq!(s.recurrence.as_deref(), Some("0 0 9 1 * * *"));
    assert_eq!(s.last_occurrence, None);
}

#[test]
fn scheduled_templates_stay_out_of_the_blotter() {
    let (store, account, _) = store_with_template(Some("0 0 9 1 * * *"));
    assert!(store.all_transactions().unwrap().is_empty());
    assert!(store.transactions_for_account(account).unwrap().is_empty());
}

#[test]
fn firing_copies_the_template_and_records_the_occurrence() {
    let (mut store, account, id) = store_with_template(Some("0 0 9 1 * * *"));
    let fired_at = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
    let copy_id = store.fire_scheduled_transaction(id, fired_at).unwrap();
    assert_ne!(copy_id, id);

    let copies = store.transactions_for_account(account).unwrap();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].id, copy_id);
    assert_eq!(copies[0].amount, -120000);
    assert_eq!(copies[0].payee, "Landlord");
    assert_eq!(copies[0].date, at(2024, 2, 1, 9));

    let schedules = store.scheduled_transactions().unwrap();
    assert_eq!(schedules[0].last_occurrence, Some(fired_at));
}

#[test]
fn firing_an_ordinary_transaction_is_rejected() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let account = store.create_account("Checking", "Bank", "USD").unwrap();
    let mut txn = Transaction::new(at(2024, 1, 1, 0), account, -100);
    txn.category_id = NO_CATEGORY_ID;
    let id = store.insert_transaction(&txn).unwrap();
    assert!(store
        .fire_scheduled_transaction(id, Utc::now())
        .is_err());
}

#[test]
fn missed_occurrences_are_computed_from_the_recorded_firing() {
    let (mut store, _, id) = store_with_template(Some("0 0 9 1 * * *"));
    store
        .fire_scheduled_transaction(id, Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())
        .unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
    let missed = recurrence::missed_occurrences(&store.scheduled_transactions().unwrap(), now);
    let dates: Vec<_> = missed.iter().map(|o| o.at).collect();
    assert_eq!(
        dates,
        vec![
            Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ]
    );
    assert!(missed.iter().all(|o| o.transaction_id == id));
}

#[test]
fn restoring_and_firing_catches_the_store_up() {
    let (mut store, account, id) = store_with_template(Some("0 0 9 1 * * *"));
    store
        .fire_scheduled_transaction(id, Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())
        .unwrap();
    let now = Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap();
    let missed = recurrence::missed_occurrences(&store.scheduled_transactions().unwrap(), now);
    for occurrence in &missed {
        store
            .fire_scheduled_transaction(occurrence.transaction_id, occurrence.at)
            .unwrap();
    }
    // January firing plus the restored February, March and April ones.
    assert_eq!(store.transactions_for_account(account).unwrap().len(), 4);
    let after = recurrence::missed_occurrences(&store.scheduled_transactions().unwrap(), now);
    assert!(after.is_empty(), "restore must be convergent");
}

#[test]
fn next_occurrence_drives_the_alarm_decision() {
    let now = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
    let s = ScheduledTransaction {
        id: 1,
        start: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        recurrence: Some("0 0 9 1 * * *".to_string()),
        last_occurrence: None,
    };
    let next = recurrence::next_occurrence(&s, now).unwrap();
    assert_eq!(next, Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
    assert!(recurrence::should_fire(next, now));
}
