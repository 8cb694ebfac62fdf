//! `agency.txt` audits.

use crate::audits::report::CategoryReport;
use crate::audits::{TIMEZONE_PATTERN, codes, data_format};
use crate::check::CheckResult;
use crate::registry::{AuditContext, AuditError, RegistryBuilder};
use crate::rules::{ColumnRule, FormatRule, Genre};
use crate::validators::{CrossReference, check_required, check_required_fields, check_unique};

pub const FILE: &str = "agency.txt";
const ID: &str = "agency_id";

const LANGUAGES: &[&str] = &[
    "en", "fr", "es", "de", "it", "pt", "nl", "sv", "da", "no", "fi", "ru", "zh", "ja", "ko", "ar",
    "EN", "FR", "ES", "DE", "IT", "PT", "NL", "SV", "DA", "NO", "FI", "RU", "ZH", "JA", "KO", "AR",
];

pub fn register(builder: &mut RegistryBuilder<CategoryReport>) {
    builder
        .register(
            FILE,
            "required_fields",
            "agency_id, name, url and timezone are present; agency_id is unique",
            vec![],
            required_fields,
        )
        .register(
            FILE,
            "data_format",
            "timezone, language, URLs, phone and email formats",
            vec![],
            |ctx| data_format(ctx, format_rules()?, ID),
        )
        .register(
            FILE,
            "data_consistency",
            "agency_id references between agency.txt and routes.txt",
            vec![],
            data_consistency,
        );
}

fn required_fields(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;

    // agency_id may be omitted when the feed has a single agency
    let id_check = if table.len() > 1 {
        check_required(table, ID, ID)
    } else {
        CheckResult::new(format!("{ID}_present"), "agency_id is present")
            .with_message("agency_id is optional with a single agency")
    };

    let mut checks = vec![
        id_check,
        check_required_fields(
            table,
            &["agency_name", "agency_url", "agency_timezone"],
            ID,
            "required_fields_present",
        ),
    ];
    if table.has_column(ID) {
        checks.push(check_unique(table, &[ID], ID));
    }
    Ok(CategoryReport::penalty("required_fields", checks, ctx.scoring))
}

pub fn format_rules() -> Result<Vec<ColumnRule>, AuditError> {
    Ok(vec![
        ColumnRule::new(
            "agency_timezone",
            FormatRule::regex("valid timezones", Genre::Required, TIMEZONE_PATTERN)?,
        ),
        ColumnRule::new(
            "agency_lang",
            codes("valid languages", Genre::Optional, LANGUAGES)?,
        ),
        ColumnRule::new("agency_url", FormatRule::url("valid URLs", Genre::Required)),
        ColumnRule::new(
            "agency_fare_url",
            FormatRule::url("valid fare URLs", Genre::Optional),
        ),
        ColumnRule::new(
            "agency_phone",
            FormatRule::regex(
                "valid phone numbers",
                Genre::Optional,
                r"[\+]?[\s\-\(\)0-9]{8,}",
            )?,
        ),
        ColumnRule::new(
            "agency_email",
            FormatRule::regex(
                "valid email addresses",
                Genre::Optional,
                r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
            )?,
        ),
    ])
}

fn data_consistency(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let link = CrossReference::lookup(ctx.tables, FILE, ID, "routes.txt");
    let checks = vec![link.orphans(), link.unused()];
    Ok(CategoryReport::validity("data_consistency", checks))
}
