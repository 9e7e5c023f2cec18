//! Fixture-generation helpers for the load-time pass.
//!
//! These mirror the dummy-data vocabulary fixture authors expect: `repeat`
//! blocks for arrays, numeric and boolean generators, identifiers, dates and
//! a handful of name/company/lorem word lists. All of them resolve once, at
//! load time; only `dir` and `metadata` are deferred.

use chrono::{Days, NaiveDate};
use handlebars::{
    BlockContext, Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderErrorReason, Renderable,
};
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::json;
use uuid::Uuid;

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Claire", "David", "Emma", "Felix", "Grace", "Hugo", "Iris", "Jules",
    "Lea", "Marc", "Nora", "Oscar", "Paula", "Quentin", "Rosa", "Simon", "Thea", "Victor",
];

const LAST_NAMES: &[&str] = &[
    "Martin", "Bernard", "Dubois", "Thomas", "Robert", "Richard", "Petit", "Durand", "Leroy",
    "Moreau", "Simon", "Laurent", "Lefebvre", "Michel", "Garcia", "David", "Bertrand", "Roux",
];

const COMPANIES: &[&str] = &[
    "Acme", "Globex", "Initech", "Umbrella", "Stark Industries", "Wayne Enterprises",
    "Wonka Industries", "Tyrell", "Cyberdyne", "Aperture",
];

const DOMAINS: &[&str] = &["example.com", "example.org", "mail.test", "inbox.test"];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "magna", "aliqua",
];

/// Registers every fixture helper on `registry`.
pub(crate) fn register(registry: &mut Handlebars<'_>) {
    registry.register_helper("repeat", Box::new(Repeat));
    registry.register_helper("int", Box::new(int));
    registry.register_helper("float", Box::new(float));
    registry.register_helper("boolean", Box::new(boolean));
    registry.register_helper("guid", Box::new(guid));
    registry.register_helper("date", Box::new(date));
    registry.register_helper("time", Box::new(time));
    registry.register_helper("firstName", Box::new(first_name));
    registry.register_helper("lastName", Box::new(last_name));
    registry.register_helper("fullName", Box::new(full_name));
    registry.register_helper("email", Box::new(email));
    registry.register_helper("company", Box::new(company));
    registry.register_helper("lorem", Box::new(lorem));
}

/// Block helper rendering its body `n` times, comma-separated, so it can sit
/// directly inside a JSON array. The zero-based iteration counter is exposed
/// as `{{@index}}`.
struct Repeat;

impl HelperDef for Repeat {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let count = h
            .param(0)
            .and_then(|p| p.value().as_u64())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("repeat", 0))?;
        let Some(template) = h.template() else {
            return Ok(());
        };
        for index in 0..count {
            let mut block = BlockContext::new();
            block.set_local_var("index", json!(index));
            rc.push_block(block);
            template.render(r, ctx, rc, out)?;
            rc.pop_block();
            if index + 1 < count {
                out.write(",")?;
            }
        }
        Ok(())
    }
}

fn int(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let min = h
        .param(0)
        .and_then(|p| p.value().as_i64())
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("int", 0))?;
    let max = h
        .param(1)
        .and_then(|p| p.value().as_i64())
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("int", 1))?;
    let value = rand::thread_rng().gen_range(min.min(max)..=max.max(min));
    out.write(&value.to_string())?;
    Ok(())
}

fn float(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let min = h
        .param(0)
        .and_then(|p| p.value().as_f64())
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("float", 0))?;
    let max = h
        .param(1)
        .and_then(|p| p.value().as_f64())
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("float", 1))?;
    let (lo, hi) = (min.min(max), max.max(min));
    let value = if hi > lo {
        rand::thread_rng().gen_range(lo..hi)
    } else {
        lo
    };
    out.write(&format!("{value:.2}"))?;
    Ok(())
}

fn boolean(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let value: bool = rand::thread_rng().r#gen();
    out.write(if value { "true" } else { "false" })?;
    Ok(())
}

fn guid(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&Uuid::new_v4().to_string())?;
    Ok(())
}

/// Random calendar date, `YYYY-MM-DD`. Optional min/max year parameters
/// bound the range; defaults to 1970..=2020.
fn date(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let min_year = h.param(0).and_then(|p| p.value().as_i64()).unwrap_or(1970) as i32;
    let max_year = h.param(1).and_then(|p| p.value().as_i64()).unwrap_or(2020) as i32;
    let start = NaiveDate::from_ymd_opt(min_year.min(max_year), 1, 1).unwrap_or_default();
    let end = NaiveDate::from_ymd_opt(max_year.max(min_year), 12, 31).unwrap_or_default();
    let span = end.signed_duration_since(start).num_days().max(0) as u64;
    let offset = rand::thread_rng().gen_range(0..=span);
    let day = start.checked_add_days(Days::new(offset)).unwrap_or(start);
    out.write(&day.format("%Y-%m-%d").to_string())?;
    Ok(())
}

fn time(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let mut rng = rand::thread_rng();
    let text = format!(
        "{:02}:{:02}:{:02}",
        rng.gen_range(0..24),
        rng.gen_range(0..60),
        rng.gen_range(0..60)
    );
    out.write(&text)?;
    Ok(())
}

fn pick(list: &[&str]) -> String {
    list.choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

fn first_name(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&pick(FIRST_NAMES))?;
    Ok(())
}

fn last_name(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&pick(LAST_NAMES))?;
    Ok(())
}

fn full_name(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&format!("{} {}", pick(FIRST_NAMES), pick(LAST_NAMES)))?;
    Ok(())
}

fn email(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let address = format!(
        "{}.{}@{}",
        pick(FIRST_NAMES).to_lowercase(),
        pick(LAST_NAMES).to_lowercase(),
        pick(DOMAINS)
    );
    out.write(&address)?;
    Ok(())
}

fn company(
    _: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&pick(COMPANIES))?;
    Ok(())
}

/// `{{lorem n}}`: n placeholder words, default 7.
fn lorem(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let count = h.param(0).and_then(|p| p.value().as_u64()).unwrap_or(7);
    let words: Vec<String> = (0..count).map(|_| pick(LOREM)).collect();
    out.write(&words.join(" "))?;
    Ok(())
}
