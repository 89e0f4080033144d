//! The built-in navigator.ba smoke suite.
//!
//! Every scenario navigates to the configured base URL and reads the
//! site-specific literals (search term, UI strings, form data, expected
//! status classes) from [`SiteExpectations`].

use crate::condition::Condition;
use crate::config::{HarnessConfig, LanguageStrings, SiteExpectations};
use crate::context::{DevicePreset, EnvironmentConfig};
use crate::driver::OptionChoice;
use crate::locator::{Locator, Selector};
use crate::network::{ExchangeMatcher, HttpMethod, UrlPattern};
use crate::scenario::Scenario;

/// Ids of the built-in scenarios, in suite order
pub const SCENARIO_IDS: [&str; 12] = [
    "TC001", "TC002", "TC003", "TC004", "TC005", "TC007", "TC009", "TC010", "TC020", "TC029",
    "TC031", "TC032",
];

const MAP: &str = ".leaflet-container";
const ZOOM_IN: &str = ".leaflet-control-zoom-in";
const ZOOM_OUT: &str = ".leaflet-control-zoom-out";
const LOCATE_ME: &str = ".leaflet-control-focusonuser-button";
const SEARCH_INPUT: &str = r#"input[type="search"], input[id^="ember"]"#;
const SEARCH_RESULTS: &str = "ul.menu_content_list.search-results";
const POPUP: &str = ".leaflet-popup-content, .popup-content";
const PLACE_DETAILS: &str = ".place_details, .left-menu-pane.place_details";
const CREATE_PLACE: &str = r##"a[href="#/create-place"]"##;
const ADD_CATEGORY: &str = r#"div.category-selector-container button.btn.btn-small[type="button"]"#;
const CATEGORY_SELECT: &str = ".category-selector-view .span3 select";
const SUBMIT: &str = ".submit-container button.btn-success";
const MOBILE_MAP_BUTTON: &str = "#mapBtnMenu";
const PLACES_ENDPOINT: &str = "/places/";

fn at(css: &str) -> Locator {
    Locator::new(css)
}

fn category_link(category: &str) -> Locator {
    at(&format!("ul.menu_content_list.categories li.{category} a"))
}

fn category_places(category: &str) -> Locator {
    at(&format!("ul.menu_content_list > li.place.{category}"))
}

fn field(name: &str) -> Locator {
    at(&format!(r#"input[name="poi[{name}]"]"#))
}

/// Every built-in scenario
#[must_use]
pub fn all(config: &HarnessConfig) -> Vec<Scenario> {
    let exp = &config.expectations;
    vec![
        homepage_load(exp),
        map_display(),
        map_zoom(),
        map_dragging(),
        geolocation(exp),
        search_location(exp),
        filter_by_category(exp),
        place_details(exp),
        create_place(exp),
        language_selection(exp),
        mobile_responsiveness(),
        browser_compatibility(),
    ]
}

/// Built-in scenario by id (case-insensitive)
#[must_use]
pub fn by_id(config: &HarnessConfig, id: &str) -> Option<Scenario> {
    all(config).into_iter().find(|s| s.id.eq_ignore_ascii_case(id))
}

/// Built-in scenarios matching `filter` (id, title or tag substring)
#[must_use]
pub fn filtered(config: &HarnessConfig, filter: Option<&str>) -> Vec<Scenario> {
    let scenarios = all(config);
    match filter {
        Some(filter) => scenarios.into_iter().filter(|s| s.matches_filter(filter)).collect(),
        None => scenarios,
    }
}

/// TC001: home page loads and lands on the categories view
#[must_use]
pub fn homepage_load(exp: &SiteExpectations) -> Scenario {
    Scenario::new("TC001", "Verify Homepage Load")
        .tag("navigation")
        .navigate_expecting("", exp.home_status)
        .label("load home page")
        .await_condition(Condition::UrlMatches(UrlPattern::Suffix(
            exp.home_url_suffix.clone(),
        )))
}

/// TC002: map container renders
#[must_use]
pub fn map_display() -> Scenario {
    Scenario::new("TC002", "Verify Map Display")
        .tag("map")
        .navigate("")
        .await_condition(Condition::visible(at(MAP)))
}

/// TC003: zoom controls respond
#[must_use]
pub fn map_zoom() -> Scenario {
    Scenario::new("TC003", "Verify Map Zoom")
        .tag("map")
        .navigate("")
        .click(at(ZOOM_IN))
        .click(at(ZOOM_OUT))
        .await_condition(Condition::enabled(at(ZOOM_IN)))
        .await_condition(Condition::enabled(at(ZOOM_OUT)))
}

/// TC004: the map survives a pointer drag
#[must_use]
pub fn map_dragging() -> Scenario {
    Scenario::new("TC004", "Verify Map Dragging")
        .tag("map")
        .navigate("")
        .await_condition(Condition::visible(at(MAP)))
        .drag(at(MAP), 100.0, 0.0)
        .await_condition(Condition::visible(at(MAP)))
        .label("map still visible after drag")
}

/// TC005: locate-me control with geolocation granted
#[must_use]
pub fn geolocation(exp: &SiteExpectations) -> Scenario {
    let environment = EnvironmentConfig::new()
        .with_permission("geolocation")
        .with_geolocation(exp.geolocation.latitude, exp.geolocation.longitude)
        .with_locale(exp.locale.clone());
    Scenario::new("TC005", "Test Geolocation Permission Granted")
        .tag("map")
        .tag("geolocation")
        .environment(environment)
        .navigate("")
        .await_condition(Condition::visible(at(LOCATE_ME)))
        .click(at(LOCATE_ME))
}

/// TC007: searching finds the configured place and opens its popup
#[must_use]
pub fn search_location(exp: &SiteExpectations) -> Scenario {
    let term = exp.search_term.as_str();
    let result = at(SEARCH_RESULTS).css("li .name").with_text(term).first();
    Scenario::new("TC007", "Search Valid Location")
        .tag("search")
        .navigate("")
        .await_condition(Condition::visible(at(SEARCH_INPUT)))
        .fill(at(SEARCH_INPUT), term)
        .press(at(SEARCH_INPUT), "Enter")
        .await_condition(Condition::visible(at(SEARCH_RESULTS)))
        .await_condition(Condition::visible(result.clone()))
        .click(result)
        .await_condition(Condition::visible(at(POPUP)))
        .await_condition(Condition::text_contains(at(POPUP), term))
}

/// TC009: category filter lists only places of that category
#[must_use]
pub fn filter_by_category(exp: &SiteExpectations) -> Scenario {
    let category = exp.category.as_str();
    let places = category_places(category);
    Scenario::new("TC009", "Filter by Category")
        .tag("category")
        .navigate("")
        .await_condition(Condition::visible(category_link(category)))
        .click(category_link(category))
        .await_condition(Condition::visible(places.clone().first()))
        .assert(Condition::every_attribute_contains(places, "class", category))
        .label(format!("every listed place is {category}"))
}

/// TC010: place detail panel shows the basics; contact details are optional
#[must_use]
pub fn place_details(exp: &SiteExpectations) -> Scenario {
    let category = exp.category.as_str();
    let places = category_places(category);
    let panel = at(PLACE_DETAILS);
    let name = panel.clone().css(".header-bar .name");
    let categories = panel.clone().css(".profile-image-link .categories");
    let website = panel.clone().css(".website a, .place-info a[href*='http']");

    Scenario::new("TC010", "View Place Details")
        .tag("category")
        .tag("details")
        .navigate("")
        .await_condition(Condition::visible(category_link(category)))
        .click(category_link(category))
        .await_condition(Condition::visible(places.clone().first()))
        .click(places.first().css(".name"))
        .await_condition(Condition::visible(panel.clone()))
        .await_condition(Condition::visible(name.clone()))
        .assert(Condition::TextNotEmpty(name))
        .label("place name not empty")
        .await_condition(Condition::visible(categories.clone()))
        .assert(Condition::Attached(categories))
        .await_condition(Condition::visible(panel.clone().css(".address, .place-info .address")))
        .await_condition(Condition::visible(panel.clone().css(".phone, .place-info .phone")))
        .assert(Condition::visible(panel.clone().css(".email, .place-info .email")))
        .optional()
        .label("email visible")
        .assert(Condition::visible(panel.css(".opening-hours, .place-info .hours")))
        .optional()
        .label("opening hours visible")
        .assert(Condition::attribute_matches(website, "href", "http"))
        .optional()
        .label("website link is http")
}

/// TC020: a filled create-place form is accepted by the server
#[must_use]
pub fn create_place(exp: &SiteExpectations) -> Scenario {
    let place = &exp.place;
    let select = at(CATEGORY_SELECT);
    Scenario::new("TC020", "Create Place with Valid Data")
        .tag("form")
        .tag("write")
        .navigate("")
        .await_condition(Condition::visible(at(CREATE_PLACE)))
        .click(at(CREATE_PLACE))
        .fill(field("name"), place.name.as_str())
        .fill(field("city_name"), place.city.as_str())
        .fill(field("zip_code"), place.zip_code.as_str())
        .fill(field("street_name"), place.street.as_str())
        .fill(field("house_number"), place.house_number.as_str())
        .fill(at(r#"textarea[name="poi[description]"]"#), place.description.as_str())
        .await_condition(Condition::visible(at(ADD_CATEGORY)))
        .click(at(ADD_CATEGORY))
        .await_condition(Condition::visible(select.clone()))
        .select(select, OptionChoice::Index(1))
        .optional()
        .label("select first real category")
        .fill(at("#working_hours_0_0"), place.opens.as_str())
        .fill(at("#working_hours_0_1"), place.closes.as_str())
        .fill(at("#poi_phone"), place.phone.as_str())
        .fill(at("#poi_web"), place.website.as_str())
        .fill(at("#poi_email"), place.email.as_str())
        .await_condition(Condition::visible(at(SUBMIT)))
        .click_and_await(
            at(SUBMIT),
            ExchangeMatcher::new(PLACES_ENDPOINT, HttpMethod::Post),
            "create",
            exp.create_status,
        )
        .label("submit and await POST /places/")
}

fn switch_language(scenario: Scenario, strings: &LanguageStrings) -> Scenario {
    let nav = at("ul.navigation.left");
    scenario
        .click(at(&format!(
            r#"ul.navigation.languages a[data-ga-label="{}"]"#,
            strings.code
        )))
        .await_condition(Condition::visible(at(&format!(
            r#"input[placeholder="{}"]"#,
            strings.search_placeholder
        ))))
        .await_condition(Condition::visible(nav.clone().locate(
            Selector::text(strings.create_place.as_str()),
        )))
        .await_condition(Condition::visible(
            nav.locate(Selector::text(strings.feedback.as_str())),
        ))
}

/// TC029: switching to English and back to Bosnian relabels the UI
#[must_use]
pub fn language_selection(exp: &SiteExpectations) -> Scenario {
    let scenario = Scenario::new("TC029", "Language Selection")
        .tag("i18n")
        .navigate("");
    let scenario = switch_language(scenario, &exp.english);
    switch_language(scenario, &exp.bosnian)
}

/// TC031: the mobile layout opens the map from its menu button
#[must_use]
pub fn mobile_responsiveness() -> Scenario {
    Scenario::new("TC031", "Mobile Responsiveness")
        .tag("mobile")
        .environment(EnvironmentConfig::new().with_device(DevicePreset::Iphone11))
        .navigate("")
        .click(at(MOBILE_MAP_BUTTON))
        .await_condition(Condition::visible(at(MAP)))
}

/// TC032: map loads in the default configuration
#[must_use]
pub fn browser_compatibility() -> Scenario {
    Scenario::new("TC032", "Browser Compatibility")
        .tag("map")
        .navigate("")
        .await_condition(Condition::visible(at(MAP)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::network::StatusClass;
    use crate::scenario::{ActionKind, StepKind};

    fn suite() -> Vec<Scenario> {
        all(&HarnessConfig::default())
    }

    mod catalog_tests {
        use super::*;

        #[test]
        fn test_ids_in_order() {
            let ids: Vec<_> = suite().into_iter().map(|s| s.id).collect();
            assert_eq!(ids, SCENARIO_IDS);
        }

        #[test]
        fn test_every_scenario_validates() {
            for scenario in suite() {
                scenario.validate().unwrap();
            }
        }

        #[test]
        fn test_by_id_ignores_case() {
            let config = HarnessConfig::default();
            assert_eq!(by_id(&config, "tc031").unwrap().id, "TC031");
            assert!(by_id(&config, "TC006").is_none());
        }

        #[test]
        fn test_filter_by_tag() {
            let map: Vec<_> = filtered(&HarnessConfig::default(), Some("map"))
                .into_iter()
                .map(|s| s.id)
                .collect();
            assert!(map.contains(&"TC002".to_string()));
            assert!(!map.contains(&"TC020".to_string()));
            assert_eq!(filtered(&HarnessConfig::default(), None).len(), 12);
        }
    }

    mod scenario_shape_tests {
        use super::*;

        #[test]
        fn test_geolocation_environment() {
            let scenario = geolocation(&SiteExpectations::default());
            let env = scenario.environment.unwrap();
            assert_eq!(env.permissions, ["geolocation"]);
            assert_eq!(env.locale.as_deref(), Some("en-US"));
            let geo = env.geolocation.unwrap();
            assert!((geo.latitude - 43.8563).abs() < f64::EPSILON);
        }

        #[test]
        fn test_mobile_uses_device_preset() {
            let env = mobile_responsiveness().environment.unwrap();
            assert_eq!(env.device, Some(DevicePreset::Iphone11));
        }

        #[test]
        fn test_create_place_ends_with_exchange_wait() {
            let scenario = create_place(&SiteExpectations::default());
            match &scenario.steps.last().unwrap().kind {
                StepKind::ActAndAwaitExchange {
                    action,
                    exchange,
                    expect,
                    ..
                } => {
                    assert_eq!(*action, ActionKind::Click);
                    assert_eq!(exchange.method, HttpMethod::Post);
                    assert_eq!(*expect, StatusClass::Success);
                }
                other => panic!("unexpected last step {other:?}"),
            }
        }

        #[test]
        fn test_place_details_marks_contact_checks_optional() {
            let scenario = place_details(&SiteExpectations::default());
            let optional: Vec<_> = scenario
                .steps
                .iter()
                .filter(|s| s.is_optional())
                .map(|s| s.describe())
                .collect();
            assert_eq!(
                optional,
                ["email visible", "opening hours visible", "website link is http"]
            );
        }

        #[test]
        fn test_search_uses_configured_term() {
            let mut exp = SiteExpectations::default();
            exp.search_term = "Zlatna ribica".into();
            let scenario = search_location(&exp);
            let text = scenario
                .steps
                .iter()
                .map(|s| s.describe())
                .collect::<Vec<_>>()
                .join("\n");
            assert!(text.contains("Zlatna ribica"));
            assert!(!text.contains("Mrvica"));
        }
    }

    mod run_tests {
        use std::sync::Arc;
        use std::time::Duration;

        use super::*;
        use crate::driver::ElementSnapshot;
        use crate::executor::{Outcome, ScenarioExecutor};
        use crate::mock::{MockEffect, MockFactory, MockPage};
        use crate::network::NetworkExchange;

        fn config() -> HarnessConfig {
            HarnessConfig::default()
                .with_step_timeout(Duration::from_millis(500))
                .with_navigation_timeout(Duration::from_secs(2))
                .with_screenshots(false)
        }

        fn targets(scenario: &Scenario) -> Vec<Locator> {
            scenario
                .steps
                .iter()
                .filter_map(|step| match &step.kind {
                    StepKind::Locate { target, .. } => Some(target.clone()),
                    StepKind::Act { target, .. } | StepKind::ActAndAwaitExchange { target, .. } => {
                        target.clone()
                    }
                    StepKind::AwaitCondition { condition, .. } | StepKind::Assert { condition } => {
                        condition.target().cloned()
                    }
                    StepKind::Navigate { .. } => None,
                })
                .collect()
        }

        /// Every element the scenario touches is present, usable and
        /// carries `text`
        fn ready(page: &MockPage, scenario: &Scenario, text: &str) {
            for target in targets(scenario) {
                let snapshot = ElementSnapshot::visible().editable().with_text(text);
                page.set_element(&target.to_string(), snapshot);
            }
        }

        async fn run(scenario: Scenario, script: impl Fn(&MockPage) + Send + Sync + 'static) -> Outcome {
            let factory = Arc::new(MockFactory::new().with_script(script));
            ScenarioExecutor::new(factory, config())
                .run_scenario(&scenario)
                .await
                .outcome
        }

        #[tokio::test(start_paused = true)]
        async fn test_homepage_lands_on_categories() {
            let outcome = run(homepage_load(&SiteExpectations::default()), |page| {
                page.set_navigation(Some(200), Some("https://www.navigator.ba/#/categories"));
            })
            .await;
            assert_eq!(outcome, Outcome::Passed);
        }

        #[tokio::test(start_paused = true)]
        async fn test_map_visible_passes() {
            let outcome = run(map_display(), |page| {
                page.set_element(MAP, ElementSnapshot::visible());
            })
            .await;
            assert_eq!(outcome, Outcome::Passed);
        }

        #[tokio::test(start_paused = true)]
        async fn test_map_never_visible_times_out() {
            let outcome = run(map_display(), |page| {
                page.set_element(MAP, ElementSnapshot::hidden());
            })
            .await;
            let failure = outcome.failure().unwrap();
            assert_eq!(failure.kind, "TimeoutExceeded");
            assert_eq!(failure.step, Some(2));
        }

        #[tokio::test(start_paused = true)]
        async fn test_search_finds_term() {
            let scenario = search_location(&SiteExpectations::default());
            let script_scenario = scenario.clone();
            let outcome = run(scenario, move |page| ready(page, &script_scenario, "Mrvica")).await;
            assert_eq!(outcome, Outcome::Passed);
        }

        #[tokio::test(start_paused = true)]
        async fn test_search_popup_without_term_fails() {
            let scenario = search_location(&SiteExpectations::default());
            let script_scenario = scenario.clone();
            let outcome = run(scenario, move |page| {
                ready(page, &script_scenario, "Mrvica");
                page.set_element(POPUP, ElementSnapshot::visible().with_text("Pekara Kiflica"));
            })
            .await;
            let failure = outcome.failure().unwrap();
            assert_eq!(failure.kind, "TimeoutExceeded");
            assert!(failure.label.contains("contains \"Mrvica\""));
        }

        fn create_place_outcome(status: u16) -> (Scenario, impl Fn(&MockPage) + Send + Sync + 'static) {
            let scenario = create_place(&SiteExpectations::default());
            let script_scenario = scenario.clone();
            let script = move |page: &MockPage| {
                ready(page, &script_scenario, "");
                page.on_click(
                    SUBMIT,
                    MockEffect::Exchange(NetworkExchange::new(
                        "https://www.navigator.ba/api/places/",
                        HttpMethod::Post,
                        status,
                    )),
                );
            };
            (scenario, script)
        }

        #[tokio::test(start_paused = true)]
        async fn test_create_place_success_status() {
            let (scenario, script) = create_place_outcome(201);
            assert_eq!(run(scenario, script).await, Outcome::Passed);
        }

        #[tokio::test(start_paused = true)]
        async fn test_create_place_rejected_status() {
            let (scenario, script) = create_place_outcome(422);
            let last = scenario.steps.len();
            let outcome = run(scenario, script).await;
            let failure = outcome.failure().unwrap();
            assert_eq!(failure.kind, "AssertionFailed");
            assert_eq!(failure.step, Some(last));
        }

        #[tokio::test(start_paused = true)]
        async fn test_place_details_partial_on_missing_contacts() {
            let scenario = place_details(&SiteExpectations::default());
            let script_scenario = scenario.clone();
            let email = at(PLACE_DETAILS).css(".email, .place-info .email");
            let outcome = run(scenario, move |page| {
                ready(page, &script_scenario, "Mrvica");
                page.set_element(&email.to_string(), ElementSnapshot::hidden());
            })
            .await;
            let labels: Vec<_> = outcome
                .optional_failures()
                .iter()
                .map(|f| f.label.as_str())
                .collect();
            assert_eq!(outcome.state(), crate::context::ScenarioState::Partial);
            assert_eq!(labels, ["email visible", "website link is http"]);
        }
    }
}
