// 📒 Ledger Engine - Monthly fee schedule with carried-forward arrears
//
// For month i in 0..12:
//   cumulative_expected += base_monthly_charge
//   cumulative_paid     += amount recorded for month i (0 if none)
//   carry_forward_due    = max(0, cumulative_expected - cumulative_paid)
//
// An early shortfall stays visible in every later month until payments catch
// up. `paid` only says whether that month's own slot holds a nonzero amount.

use crate::db::{self, PaymentEvent, Person, MONTHS_PER_CYCLE};
use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// English month names, indexed by month slot
pub const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

pub fn month_name(month_index: u8) -> &'static str {
    MONTH_NAMES
        .get(month_index as usize)
        .copied()
        .unwrap_or("Unknown")
}

// ============================================================================
// MONTH RECORD (derived, never stored)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRecord {
    pub month_index: u8,
    pub expected_this_month: i64,
    pub amount_paid: i64,
    pub cumulative_expected: i64,
    pub cumulative_paid: i64,
    pub carry_forward_due: i64,
}

impl MonthRecord {
    /// Nonzero amount in this month's slot; says nothing about arrears
    pub fn paid(&self) -> bool {
        self.amount_paid > 0
    }
}

/// Month status as exposed to the read surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthStatus {
    pub paid: bool,
    pub amount: i64,
    pub payment_id: Option<i64>,
    pub paid_on: Option<DateTime<Utc>>,
    pub expected_this_month: i64,
    pub carry_forward_due: i64,
}

/// Whole-cycle totals for one person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_expected: i64,
    pub total_paid: i64,
    pub outstanding: i64,
    pub months_paid: usize,
}

impl LedgerSummary {
    pub fn from_schedule(schedule: &[MonthRecord]) -> Self {
        let last = schedule.last();
        LedgerSummary {
            total_expected: last.map(|m| m.cumulative_expected).unwrap_or(0),
            total_paid: last.map(|m| m.cumulative_paid).unwrap_or(0),
            outstanding: last.map(|m| m.carry_forward_due).unwrap_or(0),
            months_paid: schedule.iter().filter(|m| m.paid()).count(),
        }
    }
}

// ============================================================================
// COMPUTATION
// ============================================================================

/// Derive the 12-month schedule for `person` from its payment events.
///
/// Events belonging to other persons or carrying an out-of-range slot are
/// ignored. Sums saturate instead of overflowing.
pub fn compute_schedule(person: &Person, payments: &[PaymentEvent]) -> Vec<MonthRecord> {
    let mut paid_by_month = [0i64; MONTHS_PER_CYCLE as usize];
    for payment in payments {
        if payment.person_id != person.id {
            continue;
        }
        if let Some(slot) = paid_by_month.get_mut(payment.month_index as usize) {
            *slot = payment.amount;
        }
    }

    let base = person.base_monthly_charge;
    let mut cumulative_expected: i64 = 0;
    let mut cumulative_paid: i64 = 0;

    paid_by_month
        .iter()
        .enumerate()
        .map(|(idx, &amount_paid)| {
            cumulative_expected = cumulative_expected.saturating_add(base);
            cumulative_paid = cumulative_paid.saturating_add(amount_paid);

            MonthRecord {
                month_index: idx as u8,
                expected_this_month: base,
                amount_paid,
                cumulative_expected,
                cumulative_paid,
                carry_forward_due: cumulative_expected.saturating_sub(cumulative_paid).max(0),
            }
        })
        .collect()
}

/// Join a computed schedule with the payment rows behind it
pub fn month_statuses(
    person: &Person,
    schedule: &[MonthRecord],
    payments: &[PaymentEvent],
) -> BTreeMap<u8, MonthStatus> {
    schedule
        .iter()
        .map(|record| {
            let event = payments
                .iter()
                .find(|p| p.person_id == person.id && p.month_index == record.month_index);

            let status = MonthStatus {
                paid: record.paid(),
                amount: record.amount_paid,
                payment_id: event.map(|p| p.id),
                paid_on: event.map(|p| p.recorded_at),
                expected_this_month: record.expected_this_month,
                carry_forward_due: record.carry_forward_due,
            };
            (record.month_index, status)
        })
        .collect()
}

// ============================================================================
// STORE-BACKED OPERATIONS
// ============================================================================

/// Load a person and its payments, then derive the schedule
pub fn load_schedule(
    conn: &Connection,
    person_id: i64,
) -> LedgerResult<(Person, Vec<PaymentEvent>, Vec<MonthRecord>)> {
    let person = db::get_person(conn, person_id)?;
    let payments = db::get_payments_for_person(conn, person_id)?;
    let schedule = compute_schedule(&person, &payments);
    Ok((person, payments, schedule))
}

/// Month index -> status for one person (the ledger read surface)
pub fn payment_schedule(
    conn: &Connection,
    person_id: i64,
) -> LedgerResult<BTreeMap<u8, MonthStatus>> {
    let (person, payments, schedule) = load_schedule(conn, person_id)?;
    Ok(month_statuses(&person, &schedule, &payments))
}

pub fn ledger_summary(conn: &Connection, person_id: i64) -> LedgerResult<LedgerSummary> {
    let (_, _, schedule) = load_schedule(conn, person_id)?;
    Ok(LedgerSummary::from_schedule(&schedule))
}

/// Validate a raw month index from the outside world
pub fn validate_month_index(month_index: i64) -> LedgerResult<u8> {
    if !(0..MONTHS_PER_CYCLE as i64).contains(&month_index) {
        return Err(LedgerError::validation("month_index must be between 0 and 11"));
    }
    Ok(month_index as u8)
}

pub fn validate_amount(amount: i64) -> LedgerResult<i64> {
    if amount < 0 {
        return Err(LedgerError::validation("amount must be >= 0"));
    }
    Ok(amount)
}

/// Record `amount` for `(person_id, month_index)`, overwriting any earlier
/// amount for that slot and refreshing its timestamp. Returns the payment id.
///
/// Inputs are validated before anything is written; the write itself runs in
/// one transaction.
pub fn set_payment(
    conn: &Connection,
    person_id: i64,
    month_index: i64,
    amount: i64,
) -> LedgerResult<i64> {
    let month_index = validate_month_index(month_index)?;
    let amount = validate_amount(amount)?;

    let tx = conn.unchecked_transaction()?;
    if db::find_person(&tx, person_id)?.is_none() {
        return Err(LedgerError::person_not_found(person_id));
    }
    let payment_id = db::upsert_payment_row(&tx, person_id, month_index, amount, Utc::now())?;
    tx.commit()?;

    tracing::debug!(person_id, month_index, amount, payment_id, "payment recorded");
    Ok(payment_id)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_payments, find_payment, insert_person, setup_database, NewPerson};

    fn person(charge: i64) -> Person {
        Person {
            id: 1,
            group_name: "5A".to_string(),
            display_name: "Test Person".to_string(),
            guardian_name: None,
            contact: None,
            base_monthly_charge: charge,
        }
    }

    fn payment(month_index: u8, amount: i64) -> PaymentEvent {
        PaymentEvent {
            id: month_index as i64 + 100,
            person_id: 1,
            month_index,
            amount,
            recorded_at: Utc::now(),
        }
    }

    fn dues(schedule: &[MonthRecord]) -> Vec<i64> {
        schedule.iter().map(|m| m.carry_forward_due).collect()
    }

    fn test_conn_with_person(charge: i64) -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let id = insert_person(
            &conn,
            &NewPerson {
                group_name: "5A".to_string(),
                display_name: "Amina".to_string(),
                base_monthly_charge: charge,
                ..Default::default()
            },
        )
        .unwrap();
        (conn, id)
    }

    #[test]
    fn test_schedule_has_twelve_ordered_months() {
        let schedule = compute_schedule(&person(100), &[]);
        assert_eq!(schedule.len(), 12);
        for (i, record) in schedule.iter().enumerate() {
            assert_eq!(record.month_index as usize, i);
            assert_eq!(record.expected_this_month, 100);
        }
    }

    #[test]
    fn test_single_late_payment_scenario() {
        let schedule = compute_schedule(&person(500), &[payment(5, 500)]);

        assert_eq!(
            dues(&schedule),
            vec![500, 1000, 1500, 2000, 2500, 2500, 3000, 3500, 4000, 4500, 5000, 5500]
        );
        assert_eq!(schedule[5].cumulative_expected, 3000);
        assert_eq!(schedule[5].cumulative_paid, 500);
        assert!(schedule[5].paid());
        assert!(!schedule[4].paid());

        println!("✅ Late payment scenario: month 11 due = {}", schedule[11].carry_forward_due);
    }

    #[test]
    fn test_zero_charge_never_owes() {
        let payments = vec![payment(0, 300), payment(7, 50)];
        let schedule = compute_schedule(&person(0), &payments);
        assert!(schedule.iter().all(|m| m.carry_forward_due == 0));
    }

    #[test]
    fn test_final_due_matches_closed_form() {
        let cases: Vec<(i64, Vec<(u8, i64)>)> = vec![
            (0, vec![]),
            (500, vec![]),
            (500, vec![(0, 500), (1, 500), (2, 500)]),
            (300, vec![(11, 10_000)]),
            (250, vec![(0, 100), (3, 0), (6, 900), (9, 250), (10, 1)]),
            (1, vec![(0, 1), (1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1), (7, 1), (8, 1), (9, 1), (10, 1), (11, 1)]),
        ];

        for (charge, amounts) in cases {
            let payments: Vec<PaymentEvent> =
                amounts.iter().map(|&(m, a)| payment(m, a)).collect();
            let total: i64 = amounts.iter().map(|&(_, a)| a).sum();

            let schedule = compute_schedule(&person(charge), &payments);
            assert_eq!(
                schedule[11].carry_forward_due,
                (12 * charge - total).max(0),
                "charge {} payments {:?}",
                charge,
                amounts
            );
        }
    }

    #[test]
    fn test_higher_charge_never_lowers_due() {
        let payments = vec![payment(0, 700), payment(2, 1500), payment(8, 200)];

        let mut previous = compute_schedule(&person(0), &payments);
        for charge in [100, 250, 500, 501, 1000] {
            let current = compute_schedule(&person(charge), &payments);
            for (before, after) in previous.iter().zip(current.iter()) {
                assert!(after.carry_forward_due >= before.carry_forward_due);
            }
            previous = current;
        }
    }

    #[test]
    fn test_overpayment_clears_following_months() {
        let schedule = compute_schedule(&person(100), &[payment(0, 400)]);
        assert_eq!(dues(&schedule)[..5], [0, 0, 0, 0, 100]);
        assert!(!schedule[1].paid());
    }

    #[test]
    fn test_paid_flag_ignores_arrears() {
        // Month 0 short by 400, month 1 paid in full: still owing but flagged paid
        let schedule = compute_schedule(&person(500), &[payment(0, 100), payment(1, 500)]);
        assert!(schedule[1].paid());
        assert_eq!(schedule[1].carry_forward_due, 400);

        // A zero amount recorded in a slot does not count as paid
        let schedule = compute_schedule(&person(0), &[payment(3, 0)]);
        assert!(!schedule[3].paid());
    }

    #[test]
    fn test_foreign_and_out_of_range_events_ignored() {
        let mut other = payment(0, 500);
        other.person_id = 2;
        let mut bogus = payment(0, 500);
        bogus.month_index = 12;

        let schedule = compute_schedule(&person(500), &[other, bogus]);
        assert_eq!(schedule[11].carry_forward_due, 6000);
    }

    #[test]
    fn test_statuses_skip_other_persons_rows() {
        let owner = person(500);
        let mut other = payment(3, 500);
        other.person_id = 2;
        other.id = 900;
        let own = payment(5, 500);

        let payments = [other, own.clone()];
        let schedule = compute_schedule(&owner, &payments);
        let statuses = month_statuses(&owner, &schedule, &payments);

        assert_eq!(statuses[&3].payment_id, None);
        assert_eq!(statuses[&3].paid_on, None);
        assert!(!statuses[&3].paid);
        assert_eq!(statuses[&5].payment_id, Some(own.id));
        assert_eq!(statuses[&5].paid_on, Some(own.recorded_at));
    }

    #[test]
    fn test_summary_from_schedule() {
        let schedule = compute_schedule(&person(500), &[payment(0, 500), payment(1, 250)]);
        let summary = LedgerSummary::from_schedule(&schedule);
        assert_eq!(summary.total_expected, 6000);
        assert_eq!(summary.total_paid, 750);
        assert_eq!(summary.outstanding, 5250);
        assert_eq!(summary.months_paid, 2);
    }

    #[test]
    fn test_month_names() {
        assert_eq!(month_name(0), "January");
        assert_eq!(month_name(11), "December");
        assert_eq!(month_name(12), "Unknown");
    }

    #[test]
    fn test_set_payment_is_idempotent_per_slot() {
        let (conn, id) = test_conn_with_person(500);

        let first = set_payment(&conn, id, 3, 500).unwrap();
        let stamp = find_payment(&conn, id, 3).unwrap().unwrap().recorded_at;
        let second = set_payment(&conn, id, 3, 500).unwrap();

        assert_eq!(first, second);
        assert_eq!(count_payments(&conn, id).unwrap(), 1);
        let row = find_payment(&conn, id, 3).unwrap().unwrap();
        assert_eq!(row.amount, 500);
        assert!(row.recorded_at >= stamp);
    }

    #[test]
    fn test_set_payment_overwrites_amount() {
        let (conn, id) = test_conn_with_person(500);

        set_payment(&conn, id, 3, 500).unwrap();
        set_payment(&conn, id, 3, 120).unwrap();

        assert_eq!(count_payments(&conn, id).unwrap(), 1);
        assert_eq!(find_payment(&conn, id, 3).unwrap().unwrap().amount, 120);
    }

    #[test]
    fn test_set_payment_validation() {
        let (conn, id) = test_conn_with_person(500);

        for month in [-1, 12, 99] {
            let err = set_payment(&conn, id, month, 100).unwrap_err();
            assert_eq!(err.to_string(), "month_index must be between 0 and 11");
        }
        let err = set_payment(&conn, id, 0, -5).unwrap_err();
        assert_eq!(err.to_string(), "amount must be >= 0");

        assert_eq!(count_payments(&conn, id).unwrap(), 0);
    }

    #[test]
    fn test_set_payment_unknown_person() {
        let (conn, _) = test_conn_with_person(500);
        let err = set_payment(&conn, 999, 0, 100).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn test_payment_schedule_read_surface() {
        let (conn, id) = test_conn_with_person(500);
        let payment_id = set_payment(&conn, id, 5, 500).unwrap();

        let statuses = payment_schedule(&conn, id).unwrap();
        assert_eq!(statuses.len(), 12);

        let may = &statuses[&4];
        assert!(!may.paid);
        assert_eq!(may.payment_id, None);
        assert_eq!(may.paid_on, None);
        assert_eq!(may.carry_forward_due, 2500);

        let june = &statuses[&5];
        assert!(june.paid);
        assert_eq!(june.amount, 500);
        assert_eq!(june.payment_id, Some(payment_id));
        assert!(june.paid_on.is_some());
        assert_eq!(june.expected_this_month, 500);
        assert_eq!(june.carry_forward_due, 2500);

        assert_eq!(statuses[&11].carry_forward_due, 5500);
    }

    #[test]
    fn test_ledger_summary_from_store() {
        let (conn, id) = test_conn_with_person(300);
        set_payment(&conn, id, 0, 300).unwrap();
        set_payment(&conn, id, 1, 0).unwrap();

        let summary = ledger_summary(&conn, id).unwrap();
        assert_eq!(summary.total_expected, 3600);
        assert_eq!(summary.total_paid, 300);
        assert_eq!(summary.outstanding, 3300);
        assert_eq!(summary.months_paid, 1);
    }

    #[test]
    fn test_payment_schedule_unknown_person() {
        let (conn, _) = test_conn_with_person(500);
        assert!(matches!(
            payment_schedule(&conn, 404),
            Err(LedgerError::NotFound(_))
        ));
    }
}
