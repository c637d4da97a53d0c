//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::credentials::CredentialSet;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of users (Username, Role, Attributes, Created, Updated).
///
/// Hashes and salts are never shown.
pub fn print_users_table(users: &CredentialSet) {
    if users.is_empty() {
        info("No users yet.");
        tip("Run `credvault add <USERNAME>` to add the first one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Username", "Role", "Attributes", "Created", "Updated"]);

    for user in users.iter() {
        let attributes = if user.attributes.is_empty() {
            "-".to_string()
        } else {
            user.attributes
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        table.add_row(vec![
            user.username.clone(),
            user.role.clone(),
            attributes,
            user.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            user.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}
