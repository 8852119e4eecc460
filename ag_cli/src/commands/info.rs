//! Info command implementation.

use console::style;

use ag_core::{Error, PackageInfo};
use ag_io::CatalogClient;

/// Run the info command.
pub async fn run_info(catalog: &CatalogClient, name: &str, json: bool) -> Result<(), Error> {
    let package = catalog.find_package(name).await?;

    if json {
        println!("{}", package_json(package.as_ref())?);
        return Ok(());
    }

    match package {
        Some(package) => {
            println!(
                "{} {}",
                style("==>").cyan().bold(),
                style(package.display_name()).bold()
            );
            for line in format_package_lines(&package) {
                println!("{}", line);
            }
        }
        None => {
            println!(
                "{} No package named '{}' in the catalog",
                style("==>").yellow().bold(),
                name
            );
        }
    }

    Ok(())
}

/// Pretty JSON for a lookup result; `null` when the package does not exist.
pub fn package_json(package: Option<&PackageInfo>) -> Result<String, Error> {
    serde_json::to_string_pretty(&package).map_err(|e| Error::InvalidResponse {
        message: format!("failed to serialize package: {e}"),
    })
}

/// Human-readable detail lines, one field per line.
pub fn format_package_lines(package: &PackageInfo) -> Vec<String> {
    let mut lines = vec![format!("Id:       {}", package.id)];

    if let Some(ref version) = package.version {
        lines.push(format!("Version:  {}", version));
    }
    if let Some(ref manifest) = package.manifest_path {
        lines.push(format!("Manifest: {}", manifest));
    }
    if !package.tags.is_empty() {
        lines.push(format!("Tags:     {}", package.tags.join(", ")));
    }

    lines
}
