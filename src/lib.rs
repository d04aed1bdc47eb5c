/*!
# Sheet Portal

A small browser-based portal that shows per-user monthly figures kept in
remote spreadsheets, built in Rust.

## Overview

Users log in with a username and password. Each month's figures live in a
separate spreadsheet named after the month (`April_2021`, `May_2021`, ...).
The portal fetches the selected months and keeps only the rows that belong
to the user. It then shows them side by side, one column per month.
Admins can look at any account, or all of them, and can upload receipt
photos to a shared Drive folder.

## Architecture

### Request Layer
- **Technologies**: axum, handlebars templates, cookie sessions
- **Key Components**:
  - Login, data, upload and logout forms
  - Passphrase-only page for shared access without accounts
  - JSON data endpoint for scripted use

### Core
- **Session Store** - Login flag, identity and admin flag per browser session
- **Credential Validator** - Account table (plain or argon2) and admin digests
- **Month Resolver** - Expands the `All` selection per role
- **Data Fetcher** - One worksheet per month, fail-fast, cached until logout
- **Row Filter** - Keeps matching rows, renames columns, merges and transposes
- **Upload Dispatcher** - Validates a JPEG and stores it under a timestamp name

### Remote Services
- Google Drive lookup and Sheets values read (`google::GoogleSheets`)
- Google Drive v2 resumable upload (`google::DriveUploader`)
- In-memory stand-ins for both (`fake`)

## Modules

- **config**: JSON configuration and secrets
- **error**: Typed errors shown to users
- **session**: Session state store
- **role**: What main users and admins may see and do
- **login**: Credential and passphrase checks
- **months**: Month selection handling
- **table**: Worksheet and result tables
- **fetcher**: Table source trait, fetch cache and batch fetch
- **filter**: Row filtering, projection, merge and transpose
- **uploader**: Image store trait and upload dispatch
- **google**: Google API clients
- **fake**: In-memory sources and stores
- **pages**: Page templates (feature `web`)
- **app**: Routing and handlers (feature `web`)

## Routes

- `GET /` - Login page, or the dashboard once logged in
- `POST /login`, `POST /logout` - Start or end a session
- `POST /data` - Show data for the selected months
- `POST /api/data` - Same as `/data`, as JSON
- `POST /upload` - Upload a photo (admins)
- `GET /simple`, `POST /simple/data`, `POST /simple/upload` - Passphrase page
*/

pub mod app;
pub mod config;
pub mod error;
pub mod fake;
pub mod fetcher;
pub mod filter;
pub mod google;
pub mod login;
pub mod months;
pub mod pages;
pub mod role;
pub mod session;
pub mod table;
pub mod uploader;

/// Re-export the core types to make them easier to use
pub use config::PortalConfig;
pub use error::{ErrorKind, PortalError};
pub use fetcher::{FetchCache, PeriodBatch, TableSource, fetch_periods};
pub use filter::{FilterSpec, filter_periods, project_periods};
pub use login::{LoginOutcome, authenticate};
pub use months::resolve_months;
pub use role::Role;
pub use session::{Session, SessionStore, SessionUpdate};
pub use table::{MergedTable, PeriodTable, ProjectedTable};
pub use uploader::{ImageStore, UploadPayload, dispatch_upload, upload_name};
