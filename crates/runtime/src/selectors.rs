//! DOM selectors and the page scripts built from them.
//!
//! Every script is a self-invoking expression evaluated with
//! `returnByValue`, so results come back as plain JSON. Selector lists are
//! embedded as JSON literals rather than spliced as raw strings.

use serde::{Deserialize, Serialize};

/// Site-specific selectors, overridable from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSelectors {
	/// Tried in order after `meta[property='og:title']`.
	pub title: Vec<String>,
	/// Visible text announcing an upcoming product.
	pub coming_soon_text: Vec<String>,
	/// Visible text announcing the product is unavailable.
	pub out_of_stock_text: Vec<String>,
	/// Elements whose presence marks the product unavailable.
	pub out_of_stock: Vec<String>,
	/// Exact button captions of the add-to-cart control.
	pub add_button_text: Vec<String>,
	/// Selectors matching the add-to-cart control.
	pub add_button: Vec<String>,
	/// Control that opens the cart drawer.
	pub cart_button: Vec<String>,
	/// Item-name elements inside the open cart.
	pub cart_item_name: Vec<String>,
	/// Present only for a signed-in visitor.
	pub account_indicator: Vec<String>,
	/// Present only for an anonymous visitor.
	pub login_control: Vec<String>,
	/// Storage keys treated as session tokens (substring, case-insensitive).
	pub storage_token_keys: Vec<String>,
	/// Same-origin path that redirects anonymous visitors.
	pub gated_path: String,
	/// Control that opens the delivery-location picker.
	pub location_bar: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
	items.iter().map(|s| s.to_string()).collect()
}

impl Default for PageSelectors {
	fn default() -> Self {
		Self {
			title: strings(&[
				"h1",
				".product-title",
				".productName",
				"[data-testid='product-title']",
				"[class*='ProductName']",
				".pdp__title",
			]),
			coming_soon_text: strings(&["Coming Soon"]),
			out_of_stock_text: strings(&["Out of Stock", "Sold Out", "Not Available", "Currently Unavailable"]),
			out_of_stock: strings(&[
				"[class*='outofstock' i]",
				"[class*='out-of-stock' i]",
				"[class*='soldout' i]",
				"[class*='sold-out' i]",
			]),
			add_button_text: strings(&["ADD", "Add", "Add to Cart", "Add to cart"]),
			add_button: strings(&[".add-to-cart", "button.add", "[data-testid='add-to-cart']"]),
			cart_button: strings(&["[class*='CartButton__Container']", "button[class*='CartButton']", "[data-testid='cart-btn']"]),
			cart_item_name: strings(&[
				".cart-item-name",
				"[data-testid='cart-item-name']",
				".CartItem__ProductName",
				".CartItemCard__ProductName",
				".cart-product-title",
				".item-name",
			]),
			account_indicator: strings(&[
				"[data-testid='user-address']",
				"[class*='user-profile']",
				"[class*='user-menu']",
				"[class*='ProfileButton']",
			]),
			login_control: strings(&["span[data-testid='login-btn']", "[class*='ProfileButton__Text']:not(:empty)"]),
			storage_token_keys: strings(&["token", "auth", "session", "user"]),
			gated_path: "/account".to_string(),
			location_bar: strings(&["[class*='LocationBar__Container']", "button:has(h3[data-testid='user-address'])"]),
		}
	}
}

/// Compiled page scripts for one selector set.
#[derive(Debug, Clone)]
pub struct ExtractionScripts {
	pub product: String,
	pub add_to_cart: String,
	pub open_cart: String,
	pub cart_items: String,
	pub ui_indicator: String,
	pub storage_token: String,
	pub gated_content: String,
	pub open_location_picker: String,
}

fn json(items: &[String]) -> String {
	serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

const HELPERS: &str = r#"
const visible = (el) => !!el && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
const first = (sels) => { for (const s of sels) { try { const el = document.querySelector(s); if (el) return el; } catch (_) {} } return null; };
const all = (sels) => { const out = []; for (const s of sels) { try { out.push(...document.querySelectorAll(s)); } catch (_) {} } return out; };
const text = (el) => ((el && (el.innerText || el.textContent)) || '').trim();
const byText = (words) => {
	const wanted = words.map((w) => w.toLowerCase());
	const nodes = document.querySelectorAll('button, a, span, div, p, h1, h2, h3, h4, h5, h6');
	for (const el of nodes) {
		if (el.children.length > 2 || !visible(el)) continue;
		const t = text(el).toLowerCase();
		if (wanted.includes(t)) return el;
	}
	return null;
};
const containsText = (words) => {
	const body = (document.body && document.body.innerText || '').toLowerCase();
	return words.some((w) => body.includes(w.toLowerCase()));
};
const disabled = (el) => !!el && (el.disabled || el.getAttribute('disabled') !== null || el.getAttribute('aria-disabled') === 'true' || String(el.className).toLowerCase().includes('disabled'));
const addControl = (s) => { const el = byText(s.addButtonText) || first(s.addButton); return visible(el) ? el : null; };
"#;

impl ExtractionScripts {
	pub fn new(selectors: &PageSelectors) -> Self {
		let config = serde_json::to_string(selectors).unwrap_or_else(|_| "{}".to_string());
		let wrap = |body: &str| format!("(() => {{ const s = {config};{HELPERS}{body} }})()");
		let wrap_async = |body: &str| format!("(async () => {{ const s = {config};{HELPERS}{body} }})()");

		Self {
			product: wrap(PRODUCT_BODY),
			add_to_cart: wrap(ADD_TO_CART_BODY),
			open_cart: wrap(OPEN_CART_BODY),
			cart_items: wrap(CART_ITEMS_BODY),
			ui_indicator: wrap(UI_INDICATOR_BODY),
			storage_token: wrap(STORAGE_TOKEN_BODY),
			gated_content: wrap_async(GATED_CONTENT_BODY),
			open_location_picker: wrap(OPEN_LOCATION_BODY),
		}
	}

	/// Clicks the saved address labelled `label` inside an open picker.
	pub fn choose_location(&self, label: &str) -> String {
		let label = json(&[label.to_string()]);
		format!(
			"(() => {{{HELPERS}const el = byText({label}); if (!el) return false; el.click(); return true; }})()"
		)
	}
}

const PRODUCT_BODY: &str = r#"
const meta = document.querySelector("meta[property='og:title']");
let name = meta ? (meta.getAttribute('content') || '').trim() : '';
if (!name) { for (const sel of s.title) { try { const t = text(document.querySelector(sel)); if (t) { name = t; break; } } catch (_) {} } }
if (!name) name = (document.title || '').trim();
const add = addControl(s);
const addEnabled = !!add && !disabled(add);
let availability = 'unknown';
if (containsText(s.comingSoonText) && !addEnabled) availability = 'coming_soon';
else if (containsText(s.outOfStockText) || all(s.outOfStock).some(visible) || (add && disabled(add))) availability = 'out_of_stock';
else if (addEnabled) availability = 'available';
return { name, availability };
"#;

const ADD_TO_CART_BODY: &str = r#"
const add = addControl(s);
if (!add || disabled(add)) return false;
add.scrollIntoView({ block: 'center' });
add.click();
return true;
"#;

const OPEN_CART_BODY: &str = r#"
const el = first(s.cartButton) || byText(['My Cart', 'Cart']);
if (!el) return false;
el.click();
return true;
"#;

const CART_ITEMS_BODY: &str = r#"
const names = all(s.cartItemName).map(text).filter((t) => t.length > 0);
if (names.length > 0) return [...new Set(names)];
const containers = all(['[class*="CartItem"]:not([class*="Divider"])', '[class*="cart-item"]', '[data-testid*="cart-item"]']);
const out = [];
for (const c of containers) {
	const head = c.querySelector('h1, h2, h3, h4, h5, h6, strong, [class*="title"], [class*="name"]');
	const t = head ? text(head) : (text(c).split('\n').find((l) => l.trim().length > 10) || '').trim();
	if (t && !out.includes(t)) out.push(t);
}
return out;
"#;

const UI_INDICATOR_BODY: &str = r#"
if (document.readyState === 'loading') return false;
if (first(s.accountIndicator)) return true;
const login = first(s.loginControl);
return !login || !visible(login);
"#;

const STORAGE_TOKEN_BODY: &str = r#"
const keys = s.storageTokenKeys.map((k) => k.toLowerCase());
const scan = (store) => { try { for (let i = 0; i < store.length; i++) { const k = (store.key(i) || '').toLowerCase(); const v = store.getItem(store.key(i)); if (v && keys.some((w) => k.includes(w))) return true; } } catch (_) {} return false; };
return scan(window.localStorage) || scan(window.sessionStorage);
"#;

const GATED_CONTENT_BODY: &str = r#"
try {
	const res = await fetch(s.gatedPath, { credentials: 'include', redirect: 'manual' });
	return res.type !== 'opaqueredirect' && res.status >= 200 && res.status < 300;
} catch (_) { return false; }
"#;

const OPEN_LOCATION_BODY: &str = r#"
const el = first(s.locationBar);
if (!el) return false;
el.click();
return true;
"#;
