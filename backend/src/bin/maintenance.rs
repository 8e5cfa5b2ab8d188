use std::env;

use anyhow::{bail, Context, Result};
use diesel::prelude::*;
use uuid::Uuid;

use logistics_backend::{
    auth::password::hash_password,
    config::AppConfig,
    db,
    domain::{EmployeeStatus, Role},
    models::NewEmployee,
    schema::employees,
};

const USAGE: &str = "Usage:\n  maintenance create-admin <email> <name> <password>\n  maintenance hash-password <password>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["create-admin", email, name, password] => create_admin(email, name, password)?,
        ["hash-password", password] => println!("{}", hash_password(password)?),
        [cmd, ..] => {
            eprintln!("Unknown command or arguments: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        [] => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn create_admin(email: &str, name: &str, password: &str) -> Result<()> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        bail!("{email} is not an email address");
    }
    if password.chars().count() < 8 {
        bail!("password must be at least 8 characters");
    }

    let config = AppConfig::from_env()?;
    let pool = db::init_pool(&config.database_url)?;
    db::run_migrations(&pool)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let admin = NewEmployee {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email: email.clone(),
        password_hash: hash_password(password)?,
        role: Role::Admin.as_str().to_string(),
        status: EmployeeStatus::Activo.as_str().to_string(),
    };
    diesel::insert_into(employees::table)
        .values(&admin)
        .execute(&mut conn)
        .with_context(|| format!("failed to create admin {email}"))?;

    println!("Created admin {email} ({})", admin.id);
    Ok(())
}
