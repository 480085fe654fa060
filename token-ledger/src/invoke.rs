//! Positional-string operation surface
//!
//! Callers name a function and pass its arguments as strings. Arity and
//! blank arguments are checked here before any ledger access; payloads are
//! returned as strings (JSON for records, plain text otherwise).

use crate::{
    ledger::TokenLedger,
    marketplace::ContractAddress,
    types::{AccountId, TxId},
    Error, Result,
};
use std::fmt;
use std::str::FromStr;

/// Public operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `initAccounts(count, tokens)`
    InitAccounts,
    /// `createAccount(id, name)`
    CreateAccount,
    /// `deleteAccountByID(id)`
    DeleteAccountById,
    /// `getAccountByID(id)`
    GetAccountById,
    /// `queryAccountByName(name)`
    QueryAccountByName,
    /// `sendTokensFast(from, to, amount, isPurchase)`
    SendTokensFast,
    /// `sendTokensSafe(from, to, amount, isPurchase)`
    SendTokensSafe,
    /// `updateAccountTokens(id)`
    UpdateAccountTokens,
    /// `getAccountTokens(id)`
    GetAccountTokens,
    /// `getAccountPendingTokens(id)`
    GetAccountPendingTokens,
    /// `getAccountHistoryByID(id)`
    GetAccountHistoryById,
    /// `getTxDetails(txId)`
    GetTxDetails,
    /// `changePendingTx(channel, contractName, txId)`
    ChangePendingTx,
    /// `pruneAccountTx(id)`
    PruneAccountTx,
}

impl Function {
    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            Function::InitAccounts => "initAccounts",
            Function::CreateAccount => "createAccount",
            Function::DeleteAccountById => "deleteAccountByID",
            Function::GetAccountById => "getAccountByID",
            Function::QueryAccountByName => "queryAccountByName",
            Function::SendTokensFast => "sendTokensFast",
            Function::SendTokensSafe => "sendTokensSafe",
            Function::UpdateAccountTokens => "updateAccountTokens",
            Function::GetAccountTokens => "getAccountTokens",
            Function::GetAccountPendingTokens => "getAccountPendingTokens",
            Function::GetAccountHistoryById => "getAccountHistoryByID",
            Function::GetTxDetails => "getTxDetails",
            Function::ChangePendingTx => "changePendingTx",
            Function::PruneAccountTx => "pruneAccountTx",
        }
    }

    /// Expected arguments: count and description for the arity error
    fn signature(&self) -> (usize, &'static str) {
        match self {
            Function::InitAccounts => (2, "2 (NumberOfAccounts, Tokens)"),
            Function::CreateAccount => (2, "2 (AccountID, Name)"),
            Function::QueryAccountByName => (1, "1 (Name)"),
            Function::SendTokensFast | Function::SendTokensSafe => {
                (4, "4 (FromAccountID, ToAccountID, Tokens, DataPurchase)")
            }
            Function::GetTxDetails => (1, "1 (TxID)"),
            Function::ChangePendingTx => (3, "3 (Channel, ContractName, TxID)"),
            Function::DeleteAccountById
            | Function::GetAccountById
            | Function::UpdateAccountTokens
            | Function::GetAccountTokens
            | Function::GetAccountPendingTokens
            | Function::GetAccountHistoryById
            | Function::PruneAccountTx => (1, "1 (AccountID)"),
        }
    }

    /// Check arity and reject blank arguments
    pub fn validate_args(&self, args: &[String]) -> Result<()> {
        let (count, expected) = self.signature();
        if args.len() != count {
            return Err(Error::InvalidArgumentCount { expected });
        }
        if let Some(position) = args.iter().position(|a| a.trim().is_empty()) {
            return Err(Error::EmptyArgument(position + 1));
        }
        Ok(())
    }
}

impl FromStr for Function {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let function = match s {
            "initAccounts" => Function::InitAccounts,
            "createAccount" => Function::CreateAccount,
            "deleteAccountByID" => Function::DeleteAccountById,
            "getAccountByID" => Function::GetAccountById,
            "queryAccountByName" => Function::QueryAccountByName,
            "sendTokensFast" => Function::SendTokensFast,
            "sendTokensSafe" => Function::SendTokensSafe,
            "updateAccountTokens" => Function::UpdateAccountTokens,
            "getAccountTokens" => Function::GetAccountTokens,
            "getAccountPendingTokens" => Function::GetAccountPendingTokens,
            "getAccountHistoryByID" => Function::GetAccountHistoryById,
            "getTxDetails" => Function::GetTxDetails,
            "changePendingTx" => Function::ChangePendingTx,
            "pruneAccountTx" => Function::PruneAccountTx,
            other => return Err(Error::UnknownFunction(other.to_string())),
        };
        Ok(function)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_amount(raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(Error::InvalidAmount(raw.to_string())),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim() {
        "true" | "TRUE" | "True" | "1" | "t" | "T" => Ok(true),
        "false" | "FALSE" | "False" | "0" | "f" | "F" => Ok(false),
        _ => Err(Error::InvalidArgument(format!(
            "Expecting boolean value. If this transfer is for data purchase or not: {}",
            raw
        ))),
    }
}

/// Run one public operation and render its payload
pub async fn invoke(ledger: &TokenLedger, function: Function, args: &[String]) -> Result<String> {
    function.validate_args(args)?;

    let payload = match function {
        Function::InitAccounts => {
            let count = args[0]
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::InvalidArgument(format!("Expecting number of accounts: {}", args[0])))?;
            let tokens = args[1]
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::InvalidAmount(args[1].clone()))?;
            ledger.init_accounts(count, tokens)?;
            String::new()
        }
        Function::CreateAccount => {
            ledger.create_account(AccountId::new(args[0].as_str()), &args[1])?;
            "Account created".to_string()
        }
        Function::DeleteAccountById => {
            ledger.delete_account(&AccountId::new(args[0].as_str()))?;
            String::new()
        }
        Function::GetAccountById => {
            serde_json::to_string(&ledger.get_account(&AccountId::new(args[0].as_str()))?)?
        }
        Function::QueryAccountByName => {
            serde_json::to_string(&ledger.query_accounts_by_name(&args[0])?)?
        }
        Function::SendTokensFast | Function::SendTokensSafe => {
            let from = AccountId::new(args[0].as_str());
            let to = AccountId::new(args[1].as_str());
            // Same-account transfers are refused before the amount is even parsed
            if from == to {
                return Err(Error::InvalidTransfer);
            }
            let amount = parse_amount(&args[2])?;
            let data_purchase = parse_flag(&args[3])?;
            let tx_id = if function == Function::SendTokensFast {
                ledger.send_tokens_fast(from, to, amount, data_purchase)?
            } else {
                ledger.send_tokens_safe(from, to, amount, data_purchase)?
            };
            tx_id.to_string()
        }
        Function::UpdateAccountTokens => {
            serde_json::to_string(&ledger.update_account_tokens(&AccountId::new(args[0].as_str()))?)?
        }
        Function::GetAccountTokens => ledger
            .account_tokens(&AccountId::new(args[0].as_str()))?
            .to_string(),
        Function::GetAccountPendingTokens => ledger
            .pending_tokens(&AccountId::new(args[0].as_str()))?
            .to_string(),
        Function::GetAccountHistoryById => {
            serde_json::to_string(&ledger.account_history(&AccountId::new(args[0].as_str()))?)?
        }
        Function::GetTxDetails => ledger.tx_details(&TxId::new(args[0].as_str()))?.to_string(),
        Function::ChangePendingTx => {
            let address = ContractAddress::new(args[0].as_str(), args[1].as_str());
            let tx_id = TxId::new(args[2].as_str());
            ledger.change_pending_tx(&address, &tx_id).await?;
            tx_id.to_string()
        }
        Function::PruneAccountTx => ledger
            .prune_account_tx(&AccountId::new(args[0].as_str()))?
            .tx_id
            .map(|tx_id| tx_id.to_string())
            .unwrap_or_default(),
    };

    Ok(payload)
}
