mod access;
mod common;
mod fees;
mod ledger;
mod negotiation;
mod routing;
