//! Subcommand execution

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use churnctl::api::{ApiClient, HttpTransport, TokenStore};
use churnctl::cache::ResponseCache;
use churnctl::cli::{AdminCommand, Cli, CliError, Command, CustomerCommand};
use churnctl::data::{AdminUserUpdate, CustomerQuery, HistoricalQuery, NewAdminUser, PredictionInput};
use churnctl::prediction::PredictionTask;

pub async fn run(cli: Cli) -> Result<()> {
    let client = build_client(&cli)?;

    match cli.command {
        Command::Login { username, password } => {
            let login = client.login(&username, &password).await?;
            print_json(&login.user)
        }
        Command::Logout => {
            client.logout()?;
            print_json(&serde_json::json!({ "message": "Logged out" }))
        }
        Command::Whoami => print_json(&client.verify_token().await?),
        Command::Customers(command) => run_customers(&client, command).await,
        Command::Analytics { year, refresh } => print_json(&client.get_analytics(year, refresh).await?),
        Command::Survival { refresh } => print_json(&client.get_survival_curves(refresh).await?),
        Command::RiskFactors { refresh } => print_json(&client.get_risk_factors(refresh).await?),
        Command::History { range, page, per_page } => {
            let query = HistoricalQuery {
                start_date: range.start,
                end_date: range.end,
                page,
                per_page,
            };
            print_json(&client.get_historical_analytics(&query).await?)
        }
        Command::ExportCsv { range, out } => {
            let path = client
                .download_historical_csv(range.start, range.end, &out)
                .await
                .with_context(|| format!("Failed to export CSV into {}", out.display()))?;
            print_json(&serde_json::json!({ "path": path }))
        }
        Command::Predict {
            contract,
            monthly_charges,
            internet_service,
        } => {
            let task = PredictionTask::spawn(client);
            let outcome = task
                .submit(PredictionInput {
                    contract,
                    monthly_charges,
                    internet_service,
                })
                .await?;
            task.shutdown().await;
            print_json(&outcome)
        }
        Command::Admin(command) => run_admin(&client, command).await,
    }
}

/// A `--token` flag overrides the saved token for this run only
fn build_client(cli: &Cli) -> Result<ApiClient> {
    let config = cli.client_config();

    let client = match &cli.token {
        Some(token) => ApiClient::with_parts(
            config.clone(),
            Arc::new(HttpTransport::new(&config.base_url)?),
            Arc::new(ResponseCache::new()),
            TokenStore::with_token(token.clone()),
        ),
        None => ApiClient::new(config)?,
    };
    Ok(client)
}

async fn run_customers(client: &ApiClient, command: CustomerCommand) -> Result<()> {
    match command {
        CustomerCommand::List {
            segment,
            page,
            per_page,
            search,
            year,
            refresh,
        } => {
            let query = CustomerQuery {
                segment,
                page,
                per_page,
                search,
                year,
                force_refresh: refresh,
            };
            print_json(&client.list_customers(&query).await?)
        }
        CustomerCommand::Get { id, refresh } => print_json(&client.get_customer(&id, refresh).await?),
        CustomerCommand::Create { customer } => print_json(&client.create_customer(&customer).await?),
        CustomerCommand::Update { id, changes } => print_json(&client.update_customer(&id, &changes).await?),
        CustomerCommand::Delete { id } => print_json(&client.delete_customer(&id).await?),
    }
}

async fn run_admin(client: &ApiClient, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::List => print_json(&client.list_admin_users().await?),
        AdminCommand::Register {
            username,
            password,
            role,
            email,
        } => {
            let user = NewAdminUser {
                username,
                password,
                role,
                email,
            };
            print_json(&client.register_user(&user).await?)
        }
        AdminCommand::Update {
            username,
            email,
            role,
            password,
        } => {
            let update = AdminUserUpdate { email, role, password };
            if update.is_empty() {
                return Err(CliError::EmptyUpdate.into());
            }
            print_json(&client.update_admin_user(&username, &update).await?)
        }
        AdminCommand::Delete { username } => print_json(&client.delete_admin_user(&username).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
