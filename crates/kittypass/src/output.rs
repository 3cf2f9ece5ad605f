//! Terminal output for kittypass commands

use anyhow::Result;
use colored::Colorize;
use kittypass::{DeleteReport, Login, LoginSummary, UpdateReport, VaultSummary};
use kittypass_core::format;

const VAULT_RULE: &str = "---------------------------------------";
const LOGIN_RULE: &str = "------------------------------------------------------------------------------";

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message.green());
}

pub fn failure(message: &str) {
    eprintln!("{} {}", "error:".red(), message);
}

pub fn print_vaults(vaults: &[VaultSummary], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(vaults)?);
        return Ok(());
    }

    if vaults.is_empty() {
        println!("{}", "No matching vaults".red());
        return Ok(());
    }

    for vault in vaults {
        println!("{}", VAULT_RULE);
        println!("{} {}", "Vault Name:".blue(), vault.name);
        println!("{} {}", "Description:".blue(), vault.description);
        println!(
            "{} {} {}",
            "Creation Date:".blue(),
            format::timestamp(vault.created_at),
            format!("({})", format::relative_time(vault.created_at)).dimmed()
        );
    }
    println!("{}", VAULT_RULE);
    Ok(())
}

pub fn print_logins(logins: &[LoginSummary], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(logins)?);
        return Ok(());
    }

    if logins.is_empty() {
        println!("{}", "No matching logins".red());
        return Ok(());
    }

    for login in logins {
        println!("{}", LOGIN_RULE);
        println!("{} {}", "Vault:".blue(), login.vault_name);
        println!("{} {}", "Login Name:".blue(), login.name);
        println!("{} {}", "Username:".blue(), format::truncate(&login.username, 60));
        println!("{} {}", "Created:".blue(), format::timestamp(login.created_at));
    }
    println!("{}", LOGIN_RULE);
    Ok(())
}

pub fn print_login(login: &Login) {
    println!();
    println!("{} {}", "Login Name:".blue(), login.name);
    println!("{} {}", "Username:".blue(), login.username);
    println!("{} {}", "Password:".blue(), login.secret.as_str());
}

pub fn print_generated(password: &str) {
    println!("{} {}", "Generated password:".blue(), password);
}

pub fn print_delete_report(report: &DeleteReport) {
    success(&format!("Deleted logins: {}", report.deleted_logins));
    success(&format!("Deleted vaults: {}", report.deleted_vaults));
}

pub fn print_update_report(report: &UpdateReport) {
    success(&format!("Updated logins: {}", report.updated_logins));
    success(&format!("Updated vaults: {}", report.updated_vaults));
}
