/*!
# Equipment Data Client

Client for the chemical equipment visualizer services: authenticate, upload a
table of equipment, and turn the server-computed summary into charts, a
table and a PDF report.

## Overview

The statistics themselves are computed by the dataset service. This crate
covers what happens on the client side of that boundary:

- Spreadsheet input is normalized to CSV before it is sent. `.csv` files pass
  through untouched, `.xlsx` workbooks are converted from their first sheet,
  anything else is refused without touching the network.
- The session credential is an explicit [`Session`] handed to every
  component that makes protected requests.
- Failures from the services are classified once, where they arrive, into a
  fixed set of [`ErrorCategory`] values with a display message.
- The current dataset is an immutable value replaced wholesale on each load
  or upload.
- Summaries are projected into chart series and a 100-row table view.

## Services

| Operation | Request |
|-----------|---------|
| Login | `POST /auth/login/` `{username, password}` |
| Register | `POST /auth/register/` `{username, email, password}` |
| History | `GET /history/` |
| Detail | `GET /datasets/{id}/` |
| Upload | `POST /upload/` multipart `{file, token}` |
| Report | `GET /report/pdf/{id}/` |

All but login and registration carry `Authorization: Bearer <token>`.

## Modules

- **models**: wire types (datasets, summaries, credentials)
- **normalizer**: CSV / XLSX input normalization
- **errors**: service failures and their classification
- **session**: credential holder, token storage, login/register/logout
- **api**: the service trait and its HTTP implementation
- **dataset**: history, detail, upload and report export
- **charts**: chart series, stat cards and the table view
- **render**: SVG charts (feature `render`)
- **notify**: user-visible notices
- **config**: environment configuration
*/

pub mod api;
pub mod charts;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod models;
pub mod normalizer;
pub mod notify;
#[cfg(feature = "render")]
pub mod render;
pub mod session;

pub use api::{EquipmentApi, HttpApi};
pub use charts::{ChartSeries, StatCard, project, stat_cards, table_rows};
pub use config::ClientConfig;
pub use dataset::DatasetController;
pub use errors::{ClassifiedError, ErrorCategory, ServiceFailure};
pub use models::*;
pub use normalizer::{NormalizedFile, UploadCandidate, normalize};
pub use notify::{LogNotifier, Notice, Notifier};
pub use session::{Redirect, Route, Session, SessionManager};
