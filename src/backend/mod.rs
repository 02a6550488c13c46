//! The auth backend seam: GraphQL transport, token issuance, and
//! session-authenticated calls.

mod client;
mod graphql;
mod issuer;

pub use client::{AuthenticatedClient, ClientError};
pub use graphql::{GraphqlClient, GraphqlError};
pub use issuer::{GraphqlTokenIssuer, IssueError, IssuedToken, RotatedRefresh, TokenIssuer};
