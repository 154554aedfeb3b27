use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use super::descriptor::{EndpointDescriptor, Method, QueryTarget, Shape};
use super::validate::{Check, FieldRule};
use crate::middleware::AuthPolicy;

static CATALOG: Lazy<Vec<EndpointDescriptor>> = Lazy::new(|| {
    vec![
        EndpointDescriptor {
            name: "branches",
            path: "/api/branches",
            method: Method::Get,
            auth: AuthPolicy::Optional,
            fields: Vec::new(),
            checks: Vec::new(),
            target: QueryTarget::Sql(
                "SELECT BranchCode FROM dbo.Branches WHERE IsActive = 1 ORDER BY BranchCode",
            ),
            shape: Shape::Scalars("BranchCode"),
        },
        EndpointDescriptor {
            name: "schemes",
            path: "/api/schemes",
            method: Method::Get,
            auth: AuthPolicy::Bypass,
            fields: vec![FieldRule::text("section", "Section", 10).optional()],
            checks: Vec::new(),
            target: QueryTarget::Sql(
                "SELECT SchemeCode, SchemeName, Section FROM dbo.LoanSchemes \
                 WHERE (@P1 IS NULL OR Section = @P1) ORDER BY SchemeCode",
            ),
            shape: Shape::Rows,
        },
        EndpointDescriptor {
            name: "loan-balance",
            path: "/api/reports/loan-balance",
            method: Method::Post,
            auth: AuthPolicy::Bypass,
            fields: vec![
                FieldRule::text("branch", "BranchCode", 5),
                FieldRule::text("section", "Section", 10),
                FieldRule::text("scheme", "SchemeCode", 10),
                FieldRule::decimal("minAmount", "MinAmount", Some(Decimal::ZERO)),
                FieldRule::decimal("maxAmount", "MaxAmount", Some(Decimal::ZERO)),
                FieldRule::date("fromDate", "FromDate"),
                FieldRule::date("toDate", "ToDate"),
            ],
            checks: vec![
                Check::Ordered {
                    lower: "minAmount",
                    upper: "maxAmount",
                },
                Check::Ordered {
                    lower: "fromDate",
                    upper: "toDate",
                },
            ],
            target: QueryTarget::Procedure("dbo.usp_LoanBalanceReport"),
            shape: Shape::Rows,
        },
        EndpointDescriptor {
            name: "deposit-summary",
            path: "/api/reports/deposit-summary",
            method: Method::Post,
            auth: AuthPolicy::Bypass,
            fields: vec![
                FieldRule::text("branch", "BranchCode", 5),
                FieldRule::one_of("status", "Status", &["active", "matured", "closed"]).optional(),
                FieldRule::date("fromDate", "FromDate"),
                FieldRule::date("toDate", "ToDate"),
            ],
            checks: vec![Check::Ordered {
                lower: "fromDate",
                upper: "toDate",
            }],
            target: QueryTarget::Procedure("dbo.usp_DepositSummary"),
            shape: Shape::Rows,
        },
        EndpointDescriptor {
            name: "account-lookup",
            path: "/api/accounts/lookup",
            method: Method::Get,
            auth: AuthPolicy::Required,
            fields: vec![FieldRule::text("accountNo", "AccountNo", 20)],
            checks: Vec::new(),
            target: QueryTarget::Sql(
                "SELECT AccountNo, CustomerName, BranchCode, SchemeCode, Balance, OpenedOn \
                 FROM dbo.Accounts WHERE AccountNo = @P1",
            ),
            shape: Shape::SingleRow,
        },
        EndpointDescriptor {
            name: "users",
            path: "/api/users",
            method: Method::Get,
            auth: AuthPolicy::Required,
            fields: Vec::new(),
            checks: Vec::new(),
            target: QueryTarget::Sql(
                "SELECT UserId, Username, DisplayName, Role, IsActive, PasswordHash \
                 FROM dbo.Users ORDER BY Username",
            ),
            shape: Shape::Redact(&["PasswordHash", "Password"]),
        },
    ]
});

/// Query-backed endpoints served by the API.
pub fn catalog() -> &'static [EndpointDescriptor] {
    &CATALOG
}
