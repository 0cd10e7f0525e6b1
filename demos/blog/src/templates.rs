//! Minimal page templates so the demo renders without a template directory.

use xadmin_rs_core::AdminResult;
use xadmin_rs_template::Engine;

const BASE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{ title | default(value="") }} | {{ site_title | default(value="") }}</title></head>
<body>
<header><a href="/xadmin/">{{ site_title | default(value="") }}</a></header>
{% if breadcrumbs %}<nav>{% for crumb in breadcrumbs %}{% if crumb.url %}<a href="{{ crumb.url }}">{{ crumb.title }}</a>{% else %}{{ crumb.title }}{% endif %}{% if not loop.last %} / {% endif %}{% endfor %}</nav>{% endif %}
<main>{% block content %}{% endblock %}</main>
<footer>{{ site_footer | default(value="") }}</footer>
</body>
</html>"#;

const INDEX: &str = r#"{% extends "xadmin/base_site.html" %}
{% block content %}<h1>{{ title }}</h1>
<ul>{% for group in nav_menu %}<li>{{ group.title }}<ul>{% for item in group.menus %}<li><a href="{{ item.url }}">{{ item.title }}</a></li>{% endfor %}</ul></li>{% endfor %}</ul>
{% endblock %}"#;

const LOGIN: &str = r#"{% extends "xadmin/base_site.html" %}
{% block content %}<h1>{{ title }}</h1>
{% if error %}<p class="error">{{ error }}</p>{% endif %}
<form method="post" action="{{ app_path }}">
<input name="username" value="{{ username | default(value="") }}">
<input name="password" type="password">
<input type="hidden" name="next" value="{{ next | default(value="") }}">
<button type="submit">Log in</button>
</form>{% endblock %}"#;

const LIST: &str = r#"{% extends "xadmin/base_site.html" %}
{% block content %}<h1>{{ title }}</h1>
{% if has_add_permission %}<a href="{{ add_url }}">Add</a>{% endif %}
{% if summary %}<p>{% for key, count in summary %}{{ key }}: {{ count }} {% endfor %}</p>{% endif %}
<table>
<thead><tr>{% for h in result_headers %}<th>{% if h.url %}<a href="{{ h.url }}">{{ h.text }}</a>{% else %}{{ h.text }}{% endif %}</th>{% endfor %}</tr></thead>
<tbody>{% for row in results %}<tr>{% for cell in row.cells %}<td>{% if cell.url %}<a href="{{ cell.url }}">{{ cell.text }}</a>{% else %}{{ cell.text }}{% endif %}</td>{% endfor %}</tr>{% endfor %}</tbody>
</table>
<p>{{ result_count }} results</p>{% endblock %}"#;

const FORM: &str = r#"{% extends "xadmin/base_site.html" %}
{% block content %}<h1>{{ title }}</h1>
{% for e in errors %}<p class="error">{{ e }}</p>{% endfor %}
<form method="post">
{% for f in form.fields %}<p><label>{{ f.label }}</label>
{% if f.choices %}<select name="{{ f.html_name }}">{% for c in f.choices %}<option value="{{ c.0 }}">{{ c.1 }}</option>{% endfor %}</select>
{% else %}<input name="{{ f.html_name }}" value="{{ f.value }}">{% endif %}</p>{% endfor %}
<button type="submit">Save</button>
{% if delete_url %}<a href="{{ delete_url }}">Delete</a>{% endif %}
</form>{% endblock %}"#;

const DETAIL: &str = r#"{% extends "xadmin/base_site.html" %}
{% block content %}<h1>{{ title }}</h1>
<dl>{% for f in fields %}<dt>{{ f.label }}</dt><dd>{{ f.value | safe }}</dd>{% endfor %}</dl>
{% if change_url %}<a href="{{ change_url }}">Edit</a>{% endif %}{% endblock %}"#;

const DELETE: &str = r#"{% extends "xadmin/base_site.html" %}
{% block content %}<h1>{{ title }}</h1>
<ul>{% for d in deleted_objects %}<li>{{ d }}</li>{% endfor %}</ul>
<form method="post"><input type="hidden" name="post" value="yes"><button type="submit">Yes, delete</button></form>
{% endblock %}"#;

const LOGGED_OUT: &str = r#"{% extends "xadmin/base_site.html" %}
{% block content %}<h1>{{ title }}</h1><a href="{{ index_url }}">Log in again</a>{% endblock %}"#;

/// An engine holding the demo's page templates.
pub fn engine() -> AdminResult<Engine> {
    let mut engine = Engine::new();
    engine.add_raw_template("xadmin/base_site.html", BASE)?;
    for (name, source) in [
        ("xadmin/views/dashboard.html", INDEX),
        ("xadmin/views/login.html", LOGIN),
        ("xadmin/views/logged_out.html", LOGGED_OUT),
        ("xadmin/views/model_list.html", LIST),
        ("xadmin/views/model_form.html", FORM),
        ("xadmin/views/model_detail.html", DETAIL),
        ("xadmin/views/model_delete_confirm.html", DELETE),
    ] {
        engine.add_raw_template(name, source)?;
    }
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xadmin_rs_template::{Context, TemplateRenderer};

    #[test]
    fn test_every_page_template_loads() {
        let engine = engine().unwrap();
        assert_eq!(engine.template_names().len(), 8);
    }

    #[test]
    fn test_login_page_renders() {
        let engine = engine().unwrap();
        let ctx = Context::new().with("title", "Please Login").with("app_path", "/xadmin/login/");
        let html = engine.render(&["xadmin/views/login.html".to_string()], &ctx).unwrap();
        assert!(html.contains("<h1>Please Login</h1>"));
        // Tera escapes `/` inside html templates.
        assert!(html.contains(r#"action="&#x2F;xadmin&#x2F;login&#x2F;""#));
    }

    #[test]
    fn test_login_action_escapes_query() {
        let engine = engine().unwrap();
        let ctx = Context::new().with("app_path", "/xadmin/login/?next=\"><script>");
        let html = engine.render(&["xadmin/views/login.html".to_string()], &ctx).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    }
}
