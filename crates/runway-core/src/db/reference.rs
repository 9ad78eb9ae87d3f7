//! Reference data: accounts, cards and categories

use rusqlite::{params, OptionalExtension, Row};

use super::{get_decimal, is_unique_violation, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Account, Card, Category, NewAccount, NewCard};

const ACCOUNT_COLUMNS: &str = "id, owner, name, opening_balance, created_at";
const CARD_COLUMNS: &str =
    "id, owner, name, closing_day, due_day, payment_account_id, created_at";

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    let created_at: String = row.get(4)?;
    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        opening_balance: get_decimal(row, 3)?,
        created_at: parse_datetime(&created_at),
    })
}

fn row_to_card(row: &Row<'_>) -> rusqlite::Result<Card> {
    let created_at: String = row.get(6)?;
    Ok(Card {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        closing_day: row.get(3)?,
        due_day: row.get(4)?,
        payment_account_id: row.get(5)?,
        created_at: parse_datetime(&created_at),
    })
}

fn duplicate(what: &str, name: &str, err: rusqlite::Error) -> Error {
    if is_unique_violation(&err) {
        Error::Conflict(format!("{} '{}' already exists", what, name))
    } else {
        Error::Database(err)
    }
}

impl Database {
    /// Create a bank account
    pub fn create_account(&self, owner: &str, new: &NewAccount) -> Result<Account> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("account name is required".to_string()));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO accounts (owner, name, opening_balance) VALUES (?, ?, ?)",
            params![owner, new.name.trim(), new.opening_balance.to_string()],
        )
        .map_err(|e| duplicate("account", &new.name, e))?;

        let id = conn.last_insert_rowid();
        self.get_account(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("account {}", id)))
    }

    /// List the owner's accounts
    pub fn list_accounts(&self, owner: &str) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE owner = ? ORDER BY name",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map(params![owner], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Get an account by ID
    pub fn get_account(&self, owner: &str, id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE owner = ? AND id = ?",
                    ACCOUNT_COLUMNS
                ),
                params![owner, id],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    /// Create a credit card
    pub fn create_card(&self, owner: &str, new: &NewCard) -> Result<Card> {
        new.validate()?;
        if new.name.trim().is_empty() {
            return Err(Error::Validation("card name is required".to_string()));
        }
        if let Some(account_id) = new.payment_account_id {
            if self.get_account(owner, account_id)?.is_none() {
                return Err(Error::NotFound(format!("account {}", account_id)));
            }
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cards (owner, name, closing_day, due_day, payment_account_id) VALUES (?, ?, ?, ?, ?)",
            params![
                owner,
                new.name.trim(),
                new.closing_day,
                new.due_day,
                new.payment_account_id
            ],
        )
        .map_err(|e| duplicate("card", &new.name, e))?;

        let id = conn.last_insert_rowid();
        self.get_card(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("card {}", id)))
    }

    pub fn list_cards(&self, owner: &str) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards WHERE owner = ? ORDER BY name",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map(params![owner], row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    pub fn get_card(&self, owner: &str, id: i64) -> Result<Option<Card>> {
        let conn = self.conn()?;
        let card = conn
            .query_row(
                &format!("SELECT {} FROM cards WHERE owner = ? AND id = ?", CARD_COLUMNS),
                params![owner, id],
                row_to_card,
            )
            .optional()?;
        Ok(card)
    }

    /// Create a category, or return the existing one with the same name
    pub fn upsert_category(&self, owner: &str, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("category name is required".to_string()));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (owner, name) VALUES (?, ?) ON CONFLICT(owner, name) DO NOTHING",
            params![owner, name],
        )?;
        let category = conn.query_row(
            "SELECT id, owner, name FROM categories WHERE owner = ? AND name = ?",
            params![owner, name],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )?;
        Ok(category)
    }

    pub fn list_categories(&self, owner: &str) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, owner, name FROM categories WHERE owner = ? ORDER BY name")?;
        let categories = stmt
            .query_map(params![owner], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }
}
