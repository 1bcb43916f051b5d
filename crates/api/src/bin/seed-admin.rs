//! Bootstrap utility for the first admin account
//!
//! Registration requires an invite, and invites can only be minted by an
//! admin. This prints the SQL that seeds the first admin directly.
//!
//! Usage:
//!   seed-admin <email> <full name>
//!
//! The password is read from stdin so it does not show up in the process list.

use std::io::{self, Write};

use anyhow::{bail, Context};
use sternblitz_api::auth::{hash_password, validate_password_strength};
use sternblitz_shared::normalize_email;
use uuid::Uuid;

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(email), Some(full_name)) = (args.next(), args.next()) else {
        bail!("usage: seed-admin <email> <full name>");
    };
    let email = normalize_email(&email)?;

    print!("Password for {}: ", email);
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);

    validate_password_strength(password)?;
    let password_hash = hash_password(password).context("password hashing failed")?;

    println!();
    println!(
        "INSERT INTO users (id, email, full_name, password_hash, role) VALUES ({}, {}, {}, {}, 'admin');",
        sql_literal(&Uuid::new_v4().to_string()),
        sql_literal(&email),
        sql_literal(full_name.trim()),
        sql_literal(&password_hash),
    );

    Ok(())
}
