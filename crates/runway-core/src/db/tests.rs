//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::store::InvoiceFilter;
    use rust_decimal_macros::dec;

    const OWNER: &str = "alice";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed(db: &Database) -> (Account, Card) {
        let account = db
            .create_account(
                OWNER,
                &NewAccount {
                    name: "Checking".to_string(),
                    opening_balance: dec!(1000),
                },
            )
            .unwrap();
        let card = db
            .create_card(
                OWNER,
                &NewCard {
                    name: "Visa".to_string(),
                    closing_day: 20,
                    due_day: 28,
                    payment_account_id: Some(account.id),
                },
            )
            .unwrap();
        (account, card)
    }

    fn rent(account_id: i64) -> NewRecurringRule {
        NewRecurringRule {
            description: "Rent".to_string(),
            amount: dec!(1200),
            kind: EntryKind::Expense,
            category_id: None,
            target: Target::Account(account_id),
            day_of_month: 5,
            start_date: date(2024, 1, 1),
            end_date: None,
            note: None,
        }
    }

    fn realization(rule: &RecurringRule, day: NaiveDate, origin: Origin) -> NewLedgerEntry {
        NewLedgerEntry {
            description: rule.description.clone(),
            amount: if origin == Origin::RecurringSkip {
                Decimal::ZERO
            } else {
                rule.amount
            },
            date: day,
            kind: rule.kind,
            category_id: None,
            target: rule.target,
            status: EntryStatus::Confirmed,
            origin,
            rule_id: Some(rule.id),
            installment: None,
            invoice_id: None,
            note: None,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_accounts(OWNER).unwrap().is_empty());
        assert!(db.list_rules(OWNER, false).unwrap().is_empty());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::in_memory().unwrap();
        db.run_migrations().unwrap();
        db.run_migrations().unwrap();

        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_ledger_one_realization'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_account_crud() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);

        assert_eq!(account.name, "Checking");
        assert_eq!(account.opening_balance, dec!(1000));

        let accounts = db.list_accounts(OWNER).unwrap();
        assert_eq!(accounts.len(), 1);

        // Duplicate name for the same owner
        let dup = db.create_account(
            OWNER,
            &NewAccount {
                name: "Checking".to_string(),
                opening_balance: Decimal::ZERO,
            },
        );
        assert!(matches!(dup, Err(Error::Conflict(_))));

        // Same name, different owner is fine
        db.create_account(
            "bob",
            &NewAccount {
                name: "Checking".to_string(),
                opening_balance: Decimal::ZERO,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_owner_isolation() {
        let db = Database::in_memory().unwrap();
        let (account, card) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();

        assert!(db.get_account("bob", account.id).unwrap().is_none());
        assert!(db.get_card("bob", card.id).unwrap().is_none());
        assert!(db.get_rule("bob", rule.id).unwrap().is_none());
        assert!(db.list_rules("bob", false).unwrap().is_empty());

        // Bob cannot attach a rule to Alice's account
        let result = db.create_rule("bob", &rent(account.id));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_card_requires_known_payment_account() {
        let db = Database::in_memory().unwrap();
        let result = db.create_card(
            OWNER,
            &NewCard {
                name: "Visa".to_string(),
                closing_day: 20,
                due_day: 28,
                payment_account_id: Some(999),
            },
        );
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = db.create_card(
            OWNER,
            &NewCard {
                name: "Visa".to_string(),
                closing_day: 32,
                due_day: 28,
                payment_account_id: None,
            },
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_upsert_category_returns_existing() {
        let db = Database::in_memory().unwrap();
        let first = db.upsert_category(OWNER, "Housing").unwrap();
        let second = db.upsert_category(OWNER, "Housing").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.list_categories(OWNER).unwrap().len(), 1);
    }

    #[test]
    fn test_rule_roundtrip() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();

        assert_eq!(rule.amount, dec!(1200));
        assert_eq!(rule.target, Target::Account(account.id));
        assert_eq!(rule.day_of_month, 5);
        assert!(rule.active);
        assert!(rule.revisions.is_empty());
    }

    #[test]
    fn test_rule_validation() {
        let db = Database::in_memory().unwrap();
        let (account, card) = seed(&db);

        let mut bad = rent(account.id);
        bad.amount = dec!(-5);
        assert!(matches!(db.create_rule(OWNER, &bad), Err(Error::Validation(_))));

        let mut bad = rent(account.id);
        bad.day_of_month = 0;
        assert!(matches!(db.create_rule(OWNER, &bad), Err(Error::Validation(_))));

        // Card expense must target a card
        let mut bad = rent(account.id);
        bad.kind = EntryKind::CardExpense;
        assert!(matches!(db.create_rule(OWNER, &bad), Err(Error::Validation(_))));

        let mut ok = rent(account.id);
        ok.kind = EntryKind::CardExpense;
        ok.target = Target::Card(card.id);
        db.create_rule(OWNER, &ok).unwrap();
    }

    #[test]
    fn test_change_rule_amount_keeps_history() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();

        let may = Period::new(2024, 5).unwrap();
        let rule = db
            .change_rule_amount(OWNER, rule.id, may, dec!(1300))
            .unwrap();
        assert_eq!(rule.amount, dec!(1300));
        assert_eq!(rule.amount_for(Period::new(2024, 4).unwrap()), dec!(1200));
        assert_eq!(rule.amount_for(may), dec!(1300));

        // A later change stacks on top
        let aug = Period::new(2024, 8).unwrap();
        let rule = db
            .change_rule_amount(OWNER, rule.id, aug, dec!(1400))
            .unwrap();
        assert_eq!(rule.revisions.len(), 2);
        assert_eq!(rule.amount_for(Period::new(2024, 4).unwrap()), dec!(1200));
        assert_eq!(rule.amount_for(Period::new(2024, 7).unwrap()), dec!(1300));
        assert_eq!(rule.amount_for(aug), dec!(1400));

        // An earlier change supersedes the later revision
        let rule = db
            .change_rule_amount(OWNER, rule.id, Period::new(2024, 3).unwrap(), dec!(1250))
            .unwrap();
        assert_eq!(rule.revisions.len(), 1);
        assert_eq!(rule.amount_for(Period::new(2024, 2).unwrap()), dec!(1200));
        assert_eq!(rule.amount_for(aug), dec!(1250));

        let listed = db.list_rules(OWNER, true).unwrap();
        assert_eq!(listed[0].revisions, rule.revisions);
    }

    #[test]
    fn test_set_rule_active_and_delete() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();

        let rule = db.set_rule_active(OWNER, rule.id, false).unwrap();
        assert!(!rule.active);
        assert!(db.list_rules(OWNER, true).unwrap().is_empty());
        assert_eq!(db.list_rules(OWNER, false).unwrap().len(), 1);

        db.delete_rule(OWNER, rule.id).unwrap();
        assert!(matches!(
            db.delete_rule(OWNER, rule.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_one_realization_per_rule_per_month() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();

        db.create_ledger_entry(OWNER, &realization(&rule, date(2024, 3, 5), Origin::Recurring))
            .unwrap();

        // Any recurring-family origin collides in the same month
        for origin in [
            Origin::Recurring,
            Origin::RecurringAdjustment,
            Origin::RecurringSkip,
        ] {
            let result =
                db.create_ledger_entry(OWNER, &realization(&rule, date(2024, 3, 20), origin));
            assert!(matches!(result, Err(Error::Conflict(_))), "{:?}", origin);
        }

        // Next month is free
        db.create_ledger_entry(OWNER, &realization(&rule, date(2024, 4, 5), Origin::Recurring))
            .unwrap();

        // Manual entries linked to nothing never collide
        let manual = NewLedgerEntry::manual(
            "Groceries",
            dec!(80),
            date(2024, 3, 5),
            EntryKind::Expense,
            Target::Account(account.id),
            EntryStatus::Confirmed,
        );
        db.create_ledger_entry(OWNER, &manual).unwrap();
        db.create_ledger_entry(OWNER, &manual).unwrap();
    }

    #[test]
    fn test_ledger_entry_validation() {
        let db = Database::in_memory().unwrap();
        let (account, card) = seed(&db);

        let zero = NewLedgerEntry::manual(
            "Nothing",
            Decimal::ZERO,
            date(2024, 3, 5),
            EntryKind::Expense,
            Target::Account(account.id),
            EntryStatus::Confirmed,
        );
        assert!(matches!(
            db.create_ledger_entry(OWNER, &zero),
            Err(Error::Validation(_))
        ));

        let mut virtual_entry = zero.clone();
        virtual_entry.amount = dec!(10);
        virtual_entry.origin = Origin::RecurringVirtual;
        assert!(matches!(
            db.create_ledger_entry(OWNER, &virtual_entry),
            Err(Error::Validation(_))
        ));

        let mut unlinked = zero.clone();
        unlinked.amount = dec!(10);
        unlinked.origin = Origin::Recurring;
        assert!(matches!(
            db.create_ledger_entry(OWNER, &unlinked),
            Err(Error::Validation(_))
        ));

        let card_entry = NewLedgerEntry::manual(
            "Books",
            dec!(40),
            date(2024, 3, 5),
            EntryKind::CardExpense,
            Target::Card(card.id),
            EntryStatus::Confirmed,
        );
        let entry = db.create_ledger_entry(OWNER, &card_entry).unwrap();
        assert_eq!(entry.target, Target::Card(card.id));
    }

    #[test]
    fn test_batch_insert_is_atomic() {
        let db = Database::in_memory().unwrap();
        let (_, card) = seed(&db);

        let good = NewLedgerEntry::manual(
            "Laptop",
            dec!(500),
            date(2024, 3, 5),
            EntryKind::CardExpense,
            Target::Card(card.id),
            EntryStatus::Confirmed,
        );
        let mut bad = good.clone();
        bad.target = Target::Card(999);

        let result = db.create_ledger_entries(OWNER, &[good.clone(), bad]);
        assert!(result.is_err());
        assert!(db
            .list_ledger_entries(OWNER, &LedgerFilter::new())
            .unwrap()
            .is_empty());

        let created = db.create_ledger_entries(OWNER, &[good.clone(), good]).unwrap();
        assert_eq!(created.len(), 2);
    }

    #[test]
    fn test_update_ledger_entry() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();

        let mut pending = realization(&rule, date(2024, 3, 5), Origin::RecurringAdjustment);
        pending.status = EntryStatus::Pending;
        pending.amount = dec!(1100);
        let entry = db.create_ledger_entry(OWNER, &pending).unwrap();

        let updated = db
            .update_ledger_entry(
                OWNER,
                entry.id,
                &LedgerEntryUpdate {
                    status: Some(EntryStatus::Confirmed),
                    note: Some("paid early".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, EntryStatus::Confirmed);
        assert_eq!(updated.amount, dec!(1100));
        assert_eq!(updated.note.as_deref(), Some("paid early"));

        // Zero only for skip markers
        let result = db.update_ledger_entry(
            OWNER,
            entry.id,
            &LedgerEntryUpdate {
                amount: Some(Decimal::ZERO),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::Validation(_))));

        let skipped = db
            .update_ledger_entry(
                OWNER,
                entry.id,
                &LedgerEntryUpdate {
                    amount: Some(Decimal::ZERO),
                    origin: Some(Origin::RecurringSkip),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(skipped.origin, Origin::RecurringSkip);

        let missing = db.update_ledger_entry(OWNER, 999, &LedgerEntryUpdate::default());
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_ledger_filters() {
        let db = Database::in_memory().unwrap();
        let (account, card) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();

        db.create_ledger_entry(OWNER, &realization(&rule, date(2024, 3, 5), Origin::Recurring))
            .unwrap();
        db.create_ledger_entry(
            OWNER,
            &NewLedgerEntry::manual(
                "Salary",
                dec!(3000),
                date(2024, 3, 1),
                EntryKind::Income,
                Target::Account(account.id),
                EntryStatus::Pending,
            ),
        )
        .unwrap();
        db.create_ledger_entry(
            OWNER,
            &NewLedgerEntry::manual(
                "Books",
                dec!(40),
                date(2024, 4, 2),
                EntryKind::CardExpense,
                Target::Card(card.id),
                EntryStatus::Confirmed,
            ),
        )
        .unwrap();

        let march = Period::new(2024, 3).unwrap();
        let all = db.list_ledger_entries(OWNER, &LedgerFilter::new()).unwrap();
        assert_eq!(all.len(), 3);
        // Ordered by date
        assert_eq!(all[0].description, "Salary");

        let in_march = db
            .list_ledger_entries(OWNER, &LedgerFilter::new().period(march))
            .unwrap();
        assert_eq!(in_march.len(), 2);

        let realized = db
            .list_ledger_entries(OWNER, &LedgerFilter::new().rule(rule.id).realizations())
            .unwrap();
        assert_eq!(realized.len(), 1);

        let cards = db
            .list_ledger_entries(OWNER, &LedgerFilter::new().cards_only())
            .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].description, "Books");

        let pending = db
            .list_ledger_entries(OWNER, &LedgerFilter::new().status(EntryStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);

        assert!(db
            .list_ledger_entries("bob", &LedgerFilter::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_rule_keeps_entries() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);
        let rule = db.create_rule(OWNER, &rent(account.id)).unwrap();
        let entry = db
            .create_ledger_entry(OWNER, &realization(&rule, date(2024, 3, 5), Origin::Recurring))
            .unwrap();

        db.delete_rule(OWNER, rule.id).unwrap();
        let entry = db.get_ledger_entry(OWNER, entry.id).unwrap().unwrap();
        assert_eq!(entry.rule_id, None);
        assert_eq!(entry.amount, dec!(1200));
    }

    #[test]
    fn test_invoice_lifecycle() {
        let db = Database::in_memory().unwrap();
        let (account, card) = seed(&db);
        let may = Period::new(2024, 5).unwrap();

        let invoice = db.open_invoice(OWNER, &card, may).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Open);
        assert_eq!(invoice.window_start, date(2024, 4, 20));
        assert_eq!(invoice.closing_date, date(2024, 5, 20));
        assert_eq!(invoice.due_date, date(2024, 5, 28));

        // Opening again returns the same invoice
        let again = db.open_invoice(OWNER, &card, may).unwrap();
        assert_eq!(again.id, invoice.id);

        let charge = db
            .create_ledger_entry(
                OWNER,
                &NewLedgerEntry::manual(
                    "Books",
                    dec!(40),
                    date(2024, 5, 2),
                    EntryKind::CardExpense,
                    Target::Card(card.id),
                    EntryStatus::Confirmed,
                ),
            )
            .unwrap();

        // Only closed invoices can be paid
        let mut payment = NewLedgerEntry::manual(
            "Visa invoice",
            dec!(40),
            date(2024, 5, 28),
            EntryKind::Expense,
            Target::Account(account.id),
            EntryStatus::Confirmed,
        );
        payment.origin = Origin::Invoice;
        payment.invoice_id = Some(invoice.id);
        assert!(matches!(
            db.pay_invoice(OWNER, invoice.id, &payment),
            Err(Error::Conflict(_))
        ));

        let closed = db
            .close_invoice(OWNER, invoice.id, dec!(40), &[charge.id])
            .unwrap();
        assert_eq!(closed.status, InvoiceStatus::Closed);
        assert_eq!(closed.total, dec!(40));
        assert!(closed.closed_at.is_some());
        let linked = db.get_ledger_entry(OWNER, charge.id).unwrap().unwrap();
        assert_eq!(linked.invoice_id, Some(invoice.id));

        // Closing twice conflicts
        assert!(matches!(
            db.close_invoice(OWNER, invoice.id, dec!(40), &[]),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            db.close_invoice(OWNER, 999, dec!(40), &[]),
            Err(Error::NotFound(_))
        ));

        let (paid, entry) = db.pay_invoice(OWNER, invoice.id, &payment).unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(entry.origin, Origin::Invoice);
        assert_eq!(entry.invoice_id, Some(invoice.id));
    }

    #[test]
    fn test_invoice_filters() {
        let db = Database::in_memory().unwrap();
        let (_, card) = seed(&db);
        let april = db
            .open_invoice(OWNER, &card, Period::new(2024, 4).unwrap())
            .unwrap();
        db.open_invoice(OWNER, &card, Period::new(2024, 5).unwrap())
            .unwrap();
        db.close_invoice(OWNER, april.id, dec!(10), &[]).unwrap();

        let open = db
            .list_invoices(OWNER, &InvoiceFilter::new().status(InvoiceStatus::Open))
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].period, Period::new(2024, 5).unwrap());

        let due_may = db
            .list_invoices(
                OWNER,
                &InvoiceFilter::new().due_between(date(2024, 5, 1), date(2024, 5, 31)),
            )
            .unwrap();
        assert_eq!(due_may.len(), 1);

        let closing_by_april = db
            .list_invoices(OWNER, &InvoiceFilter::new().closing_until(date(2024, 4, 30)))
            .unwrap();
        assert_eq!(closing_by_april.len(), 1);
        assert_eq!(closing_by_april[0].id, april.id);

        assert_eq!(
            db.list_invoices(OWNER, &InvoiceFilter::new().statuses(&[]))
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn test_period_totals_and_account_balance() {
        let db = Database::in_memory().unwrap();
        let (account, card) = seed(&db);

        for (desc, amount, day, kind, status) in [
            ("Salary", dec!(3000), 1, EntryKind::Income, EntryStatus::Confirmed),
            ("Bonus", dec!(500), 25, EntryKind::Income, EntryStatus::Pending),
            ("Rent", dec!(1200), 5, EntryKind::Expense, EntryStatus::Confirmed),
            ("Gym", dec!(50), 10, EntryKind::Expense, EntryStatus::Pending),
        ] {
            db.create_ledger_entry(
                OWNER,
                &NewLedgerEntry::manual(
                    desc,
                    amount,
                    date(2024, 3, day),
                    kind,
                    Target::Account(account.id),
                    status,
                ),
            )
            .unwrap();
        }
        // Card entries stay out of the account aggregate
        db.create_ledger_entry(
            OWNER,
            &NewLedgerEntry::manual(
                "Books",
                dec!(40),
                date(2024, 3, 2),
                EntryKind::CardExpense,
                Target::Card(card.id),
                EntryStatus::Confirmed,
            ),
        )
        .unwrap();

        let totals = db
            .period_totals(OWNER, Period::new(2024, 3).unwrap())
            .unwrap();
        assert_eq!(totals.confirmed_income, dec!(3000));
        assert_eq!(totals.pending_income, dec!(500));
        assert_eq!(totals.confirmed_expense, dec!(1200));
        assert_eq!(totals.pending_expense, dec!(50));

        assert_eq!(
            db.account_balance(OWNER, account.id, date(2024, 3, 4)).unwrap(),
            Some(dec!(4000))
        );
        assert_eq!(
            db.account_balance(OWNER, account.id, date(2024, 3, 31)).unwrap(),
            Some(dec!(2800))
        );
        assert_eq!(db.account_balance("bob", account.id, date(2024, 3, 31)).unwrap(), None);
    }

    #[test]
    fn test_decimal_precision_roundtrip() {
        let db = Database::in_memory().unwrap();
        let (account, _) = seed(&db);
        let entry = db
            .create_ledger_entry(
                OWNER,
                &NewLedgerEntry::manual(
                    "Coffee",
                    dec!(0.1),
                    date(2024, 3, 1),
                    EntryKind::Expense,
                    Target::Account(account.id),
                    EntryStatus::Confirmed,
                ),
            )
            .unwrap();
        assert_eq!(entry.amount, dec!(0.1));
        let balance = db
            .account_balance(OWNER, account.id, date(2024, 3, 1))
            .unwrap()
            .unwrap();
        assert_eq!(balance, dec!(999.9));
    }
}
