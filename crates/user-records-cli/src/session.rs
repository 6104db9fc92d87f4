//! Menu-driven operator session.
//!
//! The session owns the in-memory [`RecordStore`] and threads it through every
//! menu action; nothing is kept in process-wide state.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use user_records_core::validate;
use user_records_core::{
    ConflictPolicy, EventLog, LogLevel, RecordSink, RecordStore, UpsertOutcome, UserRecord,
};

use crate::prompt::{Confirmation, Prompter};

pub const MENU: &str = "\nChoose an option:
Y - Enter new data
Q - Retrieve stored data
F - Search for a user
P - Insert all data into the database
N - Exit the program";

pub const DEFAULT_EXIT_PAUSE: Duration = Duration::from_secs(3);

const ID_PROMPT: &str = "Enter your UserID : ";

struct FieldPrompt {
    prompt: &'static str,
    error: &'static str,
    validate: fn(&str) -> bool,
}

const FIRST_NAME: FieldPrompt = FieldPrompt {
    prompt: "Enter your First Name : ",
    error: "First Name must contain only alphabetic characters.",
    validate: validate::is_valid_name,
};

const LAST_NAME: FieldPrompt = FieldPrompt {
    prompt: "Enter your Last Name : ",
    error: "Last Name must contain only alphabetic characters.",
    validate: validate::is_valid_name,
};

const AGE: FieldPrompt = FieldPrompt {
    prompt: "Enter your age : ",
    error: "Age must be a positive integer.",
    validate: validate::is_valid_age,
};

const GENDER: FieldPrompt = FieldPrompt {
    prompt: "Enter your gender : ",
    error: "Gender must be either 'male' or 'female'.",
    validate: validate::is_valid_gender,
};

const YEAR_OF_BIRTH: FieldPrompt = FieldPrompt {
    prompt: "Enter your Year of Birth : ",
    error: "You must be at least 18 years old. Please enter a valid year of birth.",
    validate: validate::is_valid_birth_year,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MenuChoice {
    Create,
    List,
    Search,
    BulkUpsert,
    Exit,
    Invalid(String),
}

impl MenuChoice {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "Y" => Self::Create,
            "Q" => Self::List,
            "F" => Self::Search,
            "P" => Self::BulkUpsert,
            "N" => Self::Exit,
            _ => Self::Invalid(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Session<'a, R, W> {
    prompter: Prompter<R, W>,
    store: RecordStore,
    store_path: PathBuf,
    sink: &'a dyn RecordSink,
    log: &'a dyn EventLog,
    exit_pause: Duration,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(
        prompter: Prompter<R, W>,
        store: RecordStore,
        store_path: PathBuf,
        sink: &'a dyn RecordSink,
        log: &'a dyn EventLog,
    ) -> Self {
        Self { prompter, store, store_path, sink, log, exit_pause: DEFAULT_EXIT_PAUSE }
    }

    #[must_use]
    pub fn with_exit_pause(mut self, exit_pause: Duration) -> Self {
        self.exit_pause = exit_pause;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn into_parts(self) -> (RecordStore, W) {
        (self.store, self.prompter.into_output())
    }

    /// Run the menu loop until the operator exits.
    ///
    /// # Errors
    /// Returns an error when operator input closes or console output fails.
    pub fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.prompter.output(), "{MENU}")?;
            let raw = self.prompter.read_line("Your choice: ")?;
            if self.step(MenuChoice::parse(&raw))? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Execute one menu selection.
    ///
    /// # Errors
    /// Returns an error when operator input closes or console output fails.
    pub fn step(&mut self, choice: MenuChoice) -> Result<Flow> {
        match choice {
            MenuChoice::Create => {
                self.announce("You chose to enter new data.", "User chose to enter new data.")?;
                self.create_record()?;
            }
            MenuChoice::List => {
                self.announce(
                    "You chose to retrieve stored data.",
                    "User chose to retrieve stored data.",
                )?;
                self.list()?;
            }
            MenuChoice::Search => {
                self.announce("You chose to search for a user.", "User chose to search for a user.")?;
                self.search()?;
            }
            MenuChoice::BulkUpsert => {
                self.announce(
                    "You chose to insert all data into the database.",
                    "User chose to insert all data into the database.",
                )?;
                self.bulk_upsert()?;
            }
            MenuChoice::Exit => {
                self.exit()?;
                return Ok(Flow::Exit);
            }
            MenuChoice::Invalid(raw) => {
                self.say("Invalid choice. Please enter a valid option.")?;
                self.log.append(
                    LogLevel::Warning,
                    "Invalid input.",
                    Some(&format!("choice={raw}")),
                );
            }
        }
        Ok(Flow::Continue)
    }

    /// Collect one record, save it to the JSON file and mirror it to the sink.
    ///
    /// Returns `None` when the file could not be written; the record is then
    /// neither kept in memory nor sent to the sink.
    ///
    /// # Errors
    /// Returns an error when operator input closes or console output fails.
    pub fn create_record(&mut self) -> Result<Option<UpsertOutcome>> {
        let (id, record) = self.collect_record()?;
        let incoming = RecordStore::single(id.clone(), record.clone());

        self.say("Handling user data...")?;
        let merged = self.store.merge(&incoming);
        if let Err(err) = merged.persist(&self.store_path) {
            let message = format!("Failed to save data to {}: {err}", self.store_path.display());
            self.log.error(&message);
            self.say(&message)?;
            return Ok(None);
        }
        self.store = merged;
        let saved = format!("Data saved to {}.", self.store_path.display());
        self.say(&saved)?;

        let prompter = &mut self.prompter;
        let mut ask = |id: &str| confirm_overwrite(prompter, id);
        let outcome = self.sink.upsert(&id, &record, ConflictPolicy::Ask(&mut ask));
        self.say(&outcome_message(&id, &outcome))?;
        self.say("New data has been collected and saved.")?;
        Ok(Some(outcome))
    }

    /// Prompt for all six fields in order.
    ///
    /// # Errors
    /// Returns an error when operator input closes or console output fails.
    pub fn collect_record(&mut self) -> Result<(String, UserRecord)> {
        self.say("Collecting user data. Please provide the following information:")?;
        let store = &self.store;
        let id = self.prompter.collect_with(
            ID_PROMPT,
            |candidate| validate::check_user_id(candidate, store.ids()),
            self.log,
        )?;
        let record = UserRecord {
            first_name: self.collect_field(&FIRST_NAME)?,
            last_name: self.collect_field(&LAST_NAME)?,
            age: self.collect_field(&AGE)?,
            gender: self.collect_field(&GENDER)?,
            year_of_birth: self.collect_field(&YEAR_OF_BIRTH)?,
        };
        self.say(&format!("Collected data: {id}: {record}"))?;
        Ok((id, record))
    }

    /// Print the raw JSON file.
    ///
    /// # Errors
    /// Returns an error when console output fails.
    pub fn list(&mut self) -> Result<()> {
        self.say("Displaying File content...")?;
        match RecordStore::read_raw(&self.store_path) {
            Ok(content) => self.say(&content),
            Err(err) => {
                let message = err.to_string();
                self.log.error(&message);
                self.say(&message)
            }
        }
    }

    /// Look up one id in the in-memory store.
    ///
    /// # Errors
    /// Returns an error when operator input closes or console output fails.
    pub fn search(&mut self) -> Result<Option<UserRecord>> {
        let id = self.prompter.read_line("Enter the UserID to search for: ")?;
        self.say("Searching for UserID...")?;
        let Some(record) = self.store.get(&id).cloned() else {
            self.say("User not found!")?;
            return Ok(None);
        };
        self.say("User found!")?;
        let body = serde_json::to_string_pretty(&record).context("failed to render record")?;
        self.say(&body)?;
        Ok(Some(record))
    }

    /// Mirror every stored record to the sink, asking before each one until
    /// the operator answers `All`.
    ///
    /// # Errors
    /// Returns an error when operator input closes or console output fails.
    /// Sink failures are per-record outcomes, not errors.
    pub fn bulk_upsert(&mut self) -> Result<Vec<(String, UpsertOutcome)>> {
        if self.store.is_empty() {
            self.say("No records to insert.")?;
            return Ok(Vec::new());
        }
        self.say("Inserting all data into the database...")?;

        let entries: Vec<(String, UserRecord)> =
            self.store.iter().map(|(id, record)| (id.clone(), record.clone())).collect();
        let mut auto_confirm = false;
        let mut outcomes = Vec::with_capacity(entries.len());

        for (id, record) in entries {
            if !auto_confirm {
                let question = format!("Insert {id} into the database? (Y/N/All): ");
                match self.prompter.confirm(&question, true)? {
                    Confirmation::Yes => {}
                    Confirmation::All => auto_confirm = true,
                    Confirmation::No => {
                        let message = format!("Record for {id} skipped by operator.");
                        self.log.warning(&message);
                        self.say(&message)?;
                        outcomes.push((id, UpsertOutcome::SkippedByOperator));
                        continue;
                    }
                }
            }

            let outcome = if auto_confirm {
                self.sink.upsert(&id, &record, ConflictPolicy::AutoConfirm)
            } else {
                let prompter = &mut self.prompter;
                let mut ask = |id: &str| confirm_overwrite(prompter, id);
                self.sink.upsert(&id, &record, ConflictPolicy::Ask(&mut ask))
            };
            self.say(&outcome_message(&id, &outcome))?;
            outcomes.push((id, outcome));
        }

        Ok(outcomes)
    }

    fn exit(&mut self) -> Result<()> {
        self.say("Exiting program.")?;
        self.log.info("Exiting program.");
        self.say("All data has been saved properly. Exiting...")?;
        thread::sleep(self.exit_pause);
        Ok(())
    }

    fn collect_field(&mut self, field: &FieldPrompt) -> Result<String> {
        Ok(self.prompter.collect(field.prompt, field.validate, field.error, self.log)?)
    }

    fn announce(&mut self, text: &str, log_message: &str) -> Result<()> {
        self.say(text)?;
        self.log.info(log_message);
        Ok(())
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.prompter.output(), "{text}").context("failed to write to console")
    }
}

fn confirm_overwrite<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    id: &str,
) -> io::Result<bool> {
    let question = format!("{id} already exists. Do you want to update the record? (Y/N): ");
    Ok(prompter.confirm(&question, false)? == Confirmation::Yes)
}

#[must_use]
pub fn outcome_message(id: &str, outcome: &UpsertOutcome) -> String {
    match outcome {
        UpsertOutcome::Inserted => format!("Record for {id} inserted successfully."),
        UpsertOutcome::Updated => format!("Record for {id} updated successfully."),
        UpsertOutcome::SkippedByOperator => format!("Record for {id} was not updated."),
        UpsertOutcome::Failed(reason) => format!("Error inserting data for {id}: {reason}"),
    }
}
